//! Fixed encode and subtitle presentation profile.

use std::path::Path;

use storyreel_transcoder::FfmpegArgs;

/// Burned-in subtitle styling (ASS `force_style` fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub font_name: &'static str,
    pub font_size: u32,
    pub primary_colour: &'static str,
    pub outline_colour: &'static str,
    pub border_style: u32,
    pub outline: u32,
    pub shadow: u32,
    pub margin_v: u32,
}

impl SubtitleStyle {
    /// Serif display font, warm off-white text on a boxed dark outline.
    pub const EPISODE: SubtitleStyle = SubtitleStyle {
        font_name: "Noto Serif",
        font_size: 22,
        primary_colour: "&H00F0E0D0",
        outline_colour: "&H00000000",
        border_style: 3,
        outline: 2,
        shadow: 1,
        margin_v: 40,
    };

    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},\
             BorderStyle={},Outline={},Shadow={},MarginV={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.border_style,
            self.outline,
            self.shadow,
            self.margin_v
        )
    }

    /// `subtitles` video filter for `srt_path` in this style.
    pub fn filter(&self, srt_path: &Path) -> String {
        format!(
            "subtitles=filename={}:force_style='{}'",
            escape_filter_path(srt_path),
            self.force_style()
        )
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self::EPISODE
    }
}

/// Quote a path for use as a filter option value inside a `-vf` graph.
///
/// ffmpeg unescapes twice: once when splitting the graph, once when the
/// filter parses its options. The option-level escape is wrapped in single
/// quotes for the graph level, with `'` written as `'\''`.
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut option_level = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        if matches!(ch, '\\' | ':' | '\'') {
            option_level.push('\\');
        }
        option_level.push(ch);
    }
    format!("'{}'", option_level.replace('\'', "'\\''"))
}

/// Video and audio encoder settings for the final artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeProfile {
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl EncodeProfile {
    pub const H264_AAC: EncodeProfile = EncodeProfile {
        video_codec: "libx264",
        preset: "medium",
        crf: 20,
        audio_codec: "aac",
        audio_bitrate: "192k",
    };

    /// Full mux invocation. `subtitle_filter` is omitted on fallback.
    pub fn mux_args(
        &self,
        video: &Path,
        audio: &Path,
        subtitle_filter: Option<&str>,
        output: &Path,
    ) -> FfmpegArgs {
        let mut args = FfmpegArgs::new().input(video).input(audio);
        if let Some(filter) = subtitle_filter {
            args = args.video_filter(filter);
        }
        args.flag("-c:v", self.video_codec)
            .flag("-preset", self.preset)
            .flag("-crf", self.crf.to_string())
            .flag("-c:a", self.audio_codec)
            .flag("-b:a", self.audio_bitrate)
            .map("0:v:0")
            .map("1:a:0")
            .arg("-shortest")
            .output(output)
    }
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::H264_AAC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_force_style_string() {
        assert_eq!(
            SubtitleStyle::EPISODE.force_style(),
            "FontName=Noto Serif,FontSize=22,PrimaryColour=&H00F0E0D0,\
             OutlineColour=&H00000000,BorderStyle=3,Outline=2,Shadow=1,MarginV=40"
        );
    }

    /// ffmpeg's `av_get_token`: a backslash escapes one character, single
    /// quotes protect everything up to the next quote.
    fn take_token<'a>(input: &'a str, delims: &[char]) -> (String, &'a str) {
        let mut out = String::new();
        let mut chars = input.char_indices();
        while let Some((i, ch)) = chars.next() {
            match ch {
                c if delims.contains(&c) => return (out, &input[i..]),
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        out.push(next);
                    }
                }
                '\'' => {
                    for (_, quoted) in chars.by_ref() {
                        if quoted == '\'' {
                            break;
                        }
                        out.push(quoted);
                    }
                }
                c => out.push(c),
            }
        }
        (out, "")
    }

    /// Options the `subtitles` filter receives after graph and option parsing.
    fn subtitles_options(filter: &str) -> Vec<(String, String)> {
        let args = filter.strip_prefix("subtitles=").unwrap();
        let (args, rest) = take_token(args, &['[', ']', ',', ';']);
        assert!(rest.is_empty(), "filter graph split at {rest:?}");

        let mut options = Vec::new();
        let mut remaining = args.as_str();
        while !remaining.is_empty() {
            let (key, after_key) = remaining.split_once('=').unwrap();
            let (value, rest) = take_token(after_key, &[':']);
            options.push((key.to_string(), value));
            remaining = rest.strip_prefix(':').unwrap_or(rest);
        }
        options
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("/out/a:b/ep01.srt")),
            "'/out/a\\:b/ep01.srt'"
        );
        assert_eq!(
            escape_filter_path(Path::new("/tmp/it's/ep01.srt")),
            "'/tmp/it\\'\\''s/ep01.srt'"
        );
        assert_eq!(
            escape_filter_path(Path::new("C:\\out\\ep.srt")),
            "'C\\:\\\\out\\\\ep.srt'"
        );
    }

    #[test]
    fn test_filter_path_survives_both_unescape_passes() {
        let style = SubtitleStyle::EPISODE;
        for raw in [
            "/out/a:b/ep01.srt",
            "/tmp/it's here/ep01.srt",
            "C:\\out\\ep.srt",
            "/tmp/a,b;c[d]/ep01.srt",
        ] {
            let options = subtitles_options(&style.filter(Path::new(raw)));
            assert_eq!(
                options,
                vec![
                    ("filename".to_string(), raw.to_string()),
                    ("force_style".to_string(), style.force_style()),
                ]
            );
        }
    }

    #[test]
    fn test_mux_args_map_one_video_and_one_audio() {
        let args = EncodeProfile::H264_AAC.mux_args(
            Path::new("page.webm"),
            Path::new("mixed.m4a"),
            Some("subtitles=ep.srt"),
            Path::new("out/ep01.mp4"),
        );
        assert_eq!(args.mappings(), vec!["0:v:0", "1:a:0"]);
        assert_eq!(args.value_of("-vf"), Some("subtitles=ep.srt"));
        assert_eq!(args.value_of("-crf"), Some("20"));
        assert_eq!(args.value_of("-b:a"), Some("192k"));
        assert!(args.contains("-shortest"));
        assert_eq!(args.as_slice().last().map(String::as_str), Some("out/ep01.mp4"));
    }

    #[test]
    fn test_mux_args_without_subtitles() {
        let args = EncodeProfile::default().mux_args(
            Path::new("page.webm"),
            Path::new("mixed.m4a"),
            None,
            Path::new("ep01.mp4"),
        );
        assert!(!args.contains("-vf"));
        assert_eq!(args.input_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_filter_path_round_trips(name in "/[a-z:'\\\\,;=\\[\\]]{0,24}") {
            let options = subtitles_options(&SubtitleStyle::EPISODE.filter(Path::new(&name)));
            prop_assert_eq!(options.len(), 2);
            prop_assert_eq!(&options[0].1, &name);
        }
    }
}
