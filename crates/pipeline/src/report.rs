//! Render report written next to the output video.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storyreel_common::StoryreelResult;

/// Summary of one successful render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    pub run_id: String,
    pub episode_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub beats: usize,
    pub narrated_beats: usize,
    pub subtitle_entries: usize,

    pub narration_marks: usize,
    pub music_cues: usize,
    pub sfx_cues: usize,

    /// Length the music and SFX layers were sized to.
    pub total_duration_ms: u64,
    /// Longest planned layer of the mixdown.
    pub mixed_duration_ms: u64,
    pub pairing: String,

    pub subtitles_burned: bool,
    pub video_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub size_bytes: u64,

    /// Elapsed milliseconds per phase.
    pub phases_ms: BTreeMap<String, u64>,
}

impl RenderReport {
    /// Report file name for an episode: `<id>.render.json`.
    pub fn file_name(episode_id: &str) -> String {
        format!("{episode_id}.render.json")
    }

    pub fn wall_time_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn save(&self, path: &Path) -> StoryreelResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> StoryreelResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
