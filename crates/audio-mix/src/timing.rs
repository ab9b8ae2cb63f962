//! Narration mark pairing and total duration.

use std::collections::HashSet;

use storyreel_narration::NarrationResult;
use storyreel_script_model::CueLogEntry;

/// Shortest total duration of any episode.
pub const TOTAL_DURATION_FLOOR_MS: u64 = 10_000;

/// Silence kept after the last narration ends.
pub const TAIL_PAD_MS: u64 = 2_000;

/// How narration marks were matched to narration results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    /// Every mark carried its beat index.
    ByBeatIndex,
    /// One mark per beat, matched in order.
    PerBeat,
    /// One mark per narrated beat, matched in order.
    PerNarratedBeat,
}

/// A narration result anchored at a playback time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkedNarration<'a> {
    pub wall_clock_ms: u64,
    pub narration: &'a NarrationResult,
}

impl MarkedNarration<'_> {
    pub fn end_ms(&self) -> u64 {
        self.wall_clock_ms
            .saturating_add(self.narration.duration_ms)
    }
}

/// Match narration marks to the results they announce.
///
/// Marks that name a beat index are matched by index (first mark per beat
/// wins). Otherwise marks are matched in order: against every beat when
/// there is one mark per beat, else against the narrated beats only. Extra
/// marks or results on either side are left unmatched.
pub fn pair_narration_marks<'a>(
    marks: &[CueLogEntry],
    results: &'a [NarrationResult],
) -> (PairingMode, Vec<MarkedNarration<'a>>) {
    if !marks.is_empty() && marks.iter().all(|mark| mark.beat.is_some()) {
        let mut seen = HashSet::new();
        let paired = marks
            .iter()
            .filter_map(|mark| {
                let beat = mark.beat?;
                if !seen.insert(beat) {
                    return None;
                }
                let narration = results.get(beat)?;
                Some(MarkedNarration {
                    wall_clock_ms: mark.wall_clock_ms,
                    narration,
                })
            })
            .collect();
        return (PairingMode::ByBeatIndex, paired);
    }

    let zip = |candidates: Vec<&'a NarrationResult>| -> Vec<MarkedNarration<'a>> {
        marks
            .iter()
            .zip(candidates)
            .map(|(mark, narration)| MarkedNarration {
                wall_clock_ms: mark.wall_clock_ms,
                narration,
            })
            .collect()
    };

    if marks.len() == results.len() {
        (PairingMode::PerBeat, zip(results.iter().collect()))
    } else {
        let narrated: Vec<&NarrationResult> =
            results.iter().filter(|r| r.audio_path.is_some()).collect();
        (PairingMode::PerNarratedBeat, zip(narrated))
    }
}

/// End of the latest narration, in playback time.
pub fn narration_end_ms(paired: &[MarkedNarration<'_>]) -> u64 {
    paired.iter().map(MarkedNarration::end_ms).max().unwrap_or(0)
}

/// Length the music and SFX layers are sized to.
///
/// `max(narration end + TAIL_PAD_MS, TOTAL_DURATION_FLOOR_MS)`.
pub fn total_duration_ms(marks: &[CueLogEntry], results: &[NarrationResult]) -> u64 {
    let (_, paired) = pair_narration_marks(marks, results);
    total_from_end(narration_end_ms(&paired))
}

pub(crate) fn total_from_end(end_ms: u64) -> u64 {
    end_ms
        .saturating_add(TAIL_PAD_MS)
        .max(TOTAL_DURATION_FLOOR_MS)
}
