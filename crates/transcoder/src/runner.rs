//! Transcoder and duration probe contracts.

use std::path::Path;

use async_trait::async_trait;
use storyreel_common::{tail_chars, StoryreelError, StoryreelResult, DIAGNOSTIC_TAIL_CHARS};

use crate::args::FfmpegArgs;

/// Result of one transcoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Diagnostic output (stderr).
    pub stderr: String,
}

impl TranscodeOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
        }
    }

    /// Last [`DIAGNOSTIC_TAIL_CHARS`] characters of the diagnostic output.
    pub fn diagnostic_tail(&self) -> &str {
        tail_chars(self.stderr.trim_end(), DIAGNOSTIC_TAIL_CHARS)
    }
}

/// Media encoder invoked with an explicit argument vector.
///
/// `run` only fails when the process could not be started or awaited; a
/// non-zero exit is reported through [`TranscodeOutput::success`].
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, args: &FfmpegArgs) -> StoryreelResult<TranscodeOutput>;

    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Run and turn a non-zero exit into [`StoryreelError::Transcode`].
    async fn run_checked(&self, args: &FfmpegArgs) -> StoryreelResult<TranscodeOutput> {
        let output = self.run(args).await?;
        if output.success {
            return Ok(output);
        }
        let target = args
            .output_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no output>".to_string());
        Err(StoryreelError::transcode(format!(
            "{} failed for {target} (exit {}): {}",
            self.name(),
            output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            output.diagnostic_tail()
        )))
    }
}

/// Measures the playback length of an audio file.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration in whole milliseconds (fractional part truncated).
    async fn probe_duration_ms(&self, path: &Path) -> StoryreelResult<u64>;
}
