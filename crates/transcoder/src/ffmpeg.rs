//! ffmpeg/ffprobe process backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use storyreel_common::{StoryreelError, StoryreelResult, TranscoderConfig};
use tokio::process::Command;

use crate::args::FfmpegArgs;
use crate::runner::{DurationProbe, TranscodeOutput, Transcoder};

/// Transcoder backed by the `ffmpeg` and `ffprobe` binaries.
///
/// Child processes are killed when the invoking future is dropped, so
/// cancelling a render never leaves an encoder running.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(&TranscoderConfig::default())
    }
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
        }
    }

    /// Whether both binaries can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, args: &FfmpegArgs) -> StoryreelResult<TranscodeOutput> {
        tracing::debug!(args = ?args.as_slice(), "Running ffmpeg");
        let started = std::time::Instant::now();

        let output = Command::new(&self.ffmpeg)
            .args(args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StoryreelError::transcode(format!("Failed to start {}: {e}", self.ffmpeg))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::debug!(
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );

        Ok(TranscodeOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr,
        })
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[async_trait]
impl DurationProbe for FfmpegTranscoder {
    async fn probe_duration_ms(&self, path: &Path) -> StoryreelResult<u64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StoryreelError::duration_probe(format!("Failed to start {}: {e}", self.ffprobe))
            })?;

        if !output.status.success() {
            return Err(StoryreelError::duration_probe(format!(
                "{} exited with {} for {}",
                self.ffprobe,
                output.status,
                path.display()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration_ms(&raw).ok_or_else(|| {
            StoryreelError::duration_probe(format!(
                "Unparseable duration {:?} for {}",
                raw.trim(),
                path.display()
            ))
        })
    }
}

/// Parse ffprobe's `csv=p=0` duration (seconds) into whole milliseconds.
pub fn parse_probe_duration_ms(raw: &str) -> Option<u64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0) as u64)
}

/// Look up a binary on `PATH` without going through a shell.
pub fn command_exists(binary: &str) -> bool {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(binary))
                .any(|full: PathBuf| full.is_file())
        })
        .unwrap_or(false)
}
