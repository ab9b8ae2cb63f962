//! Renderer handshake contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use storyreel_common::StoryreelResult;
use storyreel_script_model::{CueLog, Resolution};

use crate::signal::CompletionSignal;

/// Everything a renderer needs to play one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSession {
    pub script_path: PathBuf,
    /// Directory the renderer records its video into.
    pub video_dir: PathBuf,
    pub resolution: Resolution,
}

/// A running renderer instance.
///
/// Methods are called in handshake order: `wait_ready`, `set_durations`,
/// `start`, then `cue_log` once the completion signal fires. `shutdown` is
/// always called last, and `video_artifact` may be called after it since
/// some renderers only finalize the recording on close.
#[async_trait]
pub trait Renderer: Send {
    /// Resolve once the renderer accepts commands.
    async fn wait_ready(&mut self) -> StoryreelResult<()>;

    /// Push per-beat durations (milliseconds), index-aligned with beats.
    async fn set_durations(&mut self, durations_ms: &[u64]) -> StoryreelResult<()>;

    /// Begin playback.
    async fn start(&mut self) -> StoryreelResult<CompletionSignal>;

    /// Retrieve the cue log recorded during playback.
    async fn cue_log(&mut self) -> StoryreelResult<CueLog>;

    /// Release the renderer. Must be safe to call after any failure.
    async fn shutdown(&mut self) -> StoryreelResult<()>;

    /// Location of the captured video, if one was produced.
    async fn video_artifact(&mut self) -> StoryreelResult<Option<PathBuf>>;
}

/// Creates renderer instances.
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self, session: &RenderSession) -> StoryreelResult<Box<dyn Renderer>>;

    fn name(&self) -> &str;
}

/// Captured playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub video_path: PathBuf,
    pub cue_log: CueLog,
    pub size_bytes: u64,
}

impl Recording {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// First file in `dir` (sorted by name) with one of `extensions`.
pub fn locate_video_artifact(dir: &Path, extensions: &[String]) -> StoryreelResult<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}
