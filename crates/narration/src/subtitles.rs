//! Subtitle fragments and the episode subtitle file.
//!
//! Each narrated beat yields one fragment timed from the start of its own
//! clip. Older synthesizer releases write WebVTT; fragments are normalized
//! to SRT before they are stored.

use std::path::Path;

use storyreel_common::StoryreelResult;

use crate::engine::NarrationResult;

/// Normalize a synthesizer subtitle fragment to SRT.
///
/// SRT input is returned trimmed with `\n` line endings. WebVTT input has
/// its header dropped, timestamps rewritten, and cues numbered from 1.
pub fn normalize_fragment(raw: &str) -> String {
    let text = raw
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .trim()
        .to_string();

    if !text.starts_with("WEBVTT") {
        return text;
    }

    let mut cues = Vec::new();
    for block in text.split("\n\n").skip(1) {
        let mut lines = block.lines().skip_while(|line| !line.contains("-->"));
        let Some(timing) = lines.next() else {
            continue;
        };
        let Some(timing) = vtt_timing_to_srt(timing) else {
            continue;
        };
        let body: Vec<&str> = lines.filter(|line| !line.trim().is_empty()).collect();
        if body.is_empty() {
            continue;
        }
        cues.push(format!("{}\n{timing}\n{}", cues.len() + 1, body.join("\n")));
    }
    cues.join("\n\n")
}

/// Build the episode subtitle file from per-beat results.
///
/// Non-empty fragments are joined in beat order with a blank line.
pub fn build_subtitle_file(results: &[NarrationResult]) -> String {
    results
        .iter()
        .map(|result| result.subtitle.trim())
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write the subtitle file, returning the number of fragments written.
pub fn save_subtitle_file(results: &[NarrationResult], path: &Path) -> StoryreelResult<usize> {
    let content = build_subtitle_file(results);
    std::fs::write(path, &content)?;
    Ok(results.iter().filter(|r| r.has_subtitle()).count())
}

/// Number of timed cues in SRT content.
pub fn count_cues(srt: &str) -> usize {
    srt.lines().filter(|line| line.contains("-->")).count()
}

/// Format milliseconds as an SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(total_ms: u64) -> String {
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` (either separator) into milliseconds.
fn parse_cue_time(raw: &str) -> Option<u64> {
    let (clock, millis) = raw.trim().split_once(['.', ','])?;
    let millis: u64 = millis.parse().ok()?;
    let parts: Vec<u64> = clock
        .split(':')
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };
    hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

fn vtt_timing_to_srt(line: &str) -> Option<String> {
    let (start, rest) = line.split_once("-->")?;
    // Cue settings (position, align, ...) follow the end time.
    let end = rest.split_whitespace().next()?;
    Some(format!(
        "{} --> {}",
        format_srt_time(parse_cue_time(start)?),
        format_srt_time(parse_cue_time(end)?)
    ))
}
