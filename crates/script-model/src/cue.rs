//! Renderer cue log.
//!
//! The renderer does not play audio; it records when audio should happen
//! relative to playback start. Entries arrive in emission order, which is
//! not necessarily sorted by time.

use serde::{Deserialize, Deserializer, Serialize};

/// Milliseconds since playback start.
pub type WallClockMs = u64;

/// Latest accepted timestamp (24 h). Later values are clamped.
pub const MAX_WALL_CLOCK_MS: WallClockMs = 24 * 60 * 60 * 1000;

/// Kind of playback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// A narrated beat started.
    NarrationMark,
    /// Background music requested.
    Music,
    /// A sound effect fired.
    Sfx,
}

/// A single cue log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueLogEntry {
    #[serde(rename = "type")]
    pub kind: CueKind,

    /// Fractional renderer timestamps are truncated to whole milliseconds.
    #[serde(deserialize_with = "de_millis")]
    pub wall_clock_ms: WallClockMs,

    /// Beat index active when the cue fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat: Option<usize>,

    /// Referenced clip name (asset stem).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    /// Fade-in length in milliseconds (music only).
    #[serde(
        default,
        alias = "fade_in_ms",
        deserialize_with = "de_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub fade_in: Option<u64>,
}

impl CueLogEntry {
    /// Create a narration mark for `beat`.
    pub fn narration_mark(beat: usize, wall_clock_ms: WallClockMs) -> Self {
        Self {
            kind: CueKind::NarrationMark,
            wall_clock_ms,
            beat: Some(beat),
            clip: Some(format!("beat_{beat}")),
            volume: None,
            fade_in: None,
        }
    }

    /// Create a music cue.
    pub fn music(
        clip: impl Into<String>,
        wall_clock_ms: WallClockMs,
        volume: Option<f64>,
        fade_in: Option<u64>,
    ) -> Self {
        Self {
            kind: CueKind::Music,
            wall_clock_ms,
            beat: None,
            clip: Some(clip.into()),
            volume,
            fade_in,
        }
    }

    /// Create a sound effect cue.
    pub fn sfx(clip: impl Into<String>, wall_clock_ms: WallClockMs, volume: Option<f64>) -> Self {
        Self {
            kind: CueKind::Sfx,
            wall_clock_ms,
            beat: None,
            clip: Some(clip.into()),
            volume,
            fade_in: None,
        }
    }
}

/// Ordered cue log from one renderer run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueLog {
    entries: Vec<CueLogEntry>,
}

/// Cue log split by kind, each list in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedCues {
    pub narration_marks: Vec<CueLogEntry>,
    pub music: Vec<CueLogEntry>,
    pub sfx: Vec<CueLogEntry>,
}

impl CueLog {
    pub fn new(entries: Vec<CueLogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CueLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into narration marks, music and SFX cues.
    pub fn partition(self) -> PartitionedCues {
        let mut parts = PartitionedCues::default();
        for entry in self.entries {
            match entry.kind {
                CueKind::NarrationMark => parts.narration_marks.push(entry),
                CueKind::Music => parts.music.push(entry),
                CueKind::Sfx => parts.sfx.push(entry),
            }
        }
        parts
    }
}

/// Parse a cue log from the renderer's JSON array.
pub fn parse_cue_log(json: &str) -> Result<CueLog, serde_json::Error> {
    serde_json::from_str(json)
}

fn millis_from_f64(raw: f64) -> u64 {
    if raw.is_finite() && raw > 0.0 {
        (raw.trunc() as u64).min(MAX_WALL_CLOCK_MS)
    } else {
        0
    }
}

fn de_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    f64::deserialize(deserializer).map(millis_from_f64)
}

fn de_opt_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(|raw| raw.map(millis_from_f64))
}
