//! Assembly state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Span;

use storyreel_common::{StoryreelError, StoryreelResult};
use storyreel_transcoder::{TranscodeOutput, Transcoder};

use crate::profile::{EncodeProfile, SubtitleStyle};

/// Inputs to one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRequest {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    /// `None` when there is nothing to burn in.
    pub subtitle_path: Option<PathBuf>,
    pub output_path: PathBuf,
}

/// Final artifact of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOutcome {
    pub output_path: PathBuf,
    pub subtitles_burned: bool,
    pub size_bytes: u64,
}

impl AssemblyOutcome {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Assembly states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyState {
    Start,
    AttemptPrimary,
    AttemptFallback,
    Done { subtitles_burned: bool },
    Fatal { diagnostic: String },
}

impl AssemblyState {
    /// Transition after an encode attempt with `exit_ok`. `Start` ignores it.
    pub fn next(self, exit_ok: bool, stderr: &str) -> AssemblyState {
        match self {
            AssemblyState::Start => AssemblyState::AttemptPrimary,
            AssemblyState::AttemptPrimary if exit_ok => AssemblyState::Done {
                subtitles_burned: true,
            },
            AssemblyState::AttemptPrimary => AssemblyState::AttemptFallback,
            AssemblyState::AttemptFallback if exit_ok => AssemblyState::Done {
                subtitles_burned: false,
            },
            AssemblyState::AttemptFallback => AssemblyState::Fatal {
                diagnostic: stderr.to_string(),
            },
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssemblyState::Done { .. } | AssemblyState::Fatal { .. }
        )
    }
}

/// Muxes video, mixed audio and subtitles into the output file.
pub struct AssemblyEngine {
    transcoder: Arc<dyn Transcoder>,
    profile: EncodeProfile,
    style: SubtitleStyle,
    span: Span,
}

impl AssemblyEngine {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            profile: EncodeProfile::default(),
            style: SubtitleStyle::default(),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run the state machine to `Done` or `Fatal`.
    pub async fn assemble(&self, request: &AssemblyRequest) -> StoryreelResult<AssemblyOutcome> {
        for input in [&request.video_path, &request.audio_path] {
            if !input.is_file() {
                return Err(StoryreelError::file_not_found(input));
            }
        }
        if let Some(parent) = request.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let subtitle_filter = request
            .subtitle_path
            .as_deref()
            .map(|path| self.style.filter(path));

        // Nothing to burn in: go straight to the subtitle-free encode.
        let mut state = match subtitle_filter {
            Some(_) => AssemblyState::Start.next(true, ""),
            None => AssemblyState::AttemptFallback,
        };

        while !state.is_terminal() {
            let filter = match state {
                AssemblyState::AttemptPrimary => subtitle_filter.as_deref(),
                _ => None,
            };
            let args = self.profile.mux_args(
                &request.video_path,
                &request.audio_path,
                filter,
                &request.output_path,
            );
            tracing::info!(
                parent: &self.span,
                state = ?state,
                output = %request.output_path.display(),
                "Assembling video"
            );
            let output: TranscodeOutput = self.transcoder.run(&args).await?;
            if !output.success && state == AssemblyState::AttemptPrimary {
                tracing::warn!(
                    parent: &self.span,
                    exit_code = ?output.exit_code,
                    stderr = output.diagnostic_tail(),
                    "Encode with subtitles failed, retrying without subtitles"
                );
            }
            state = state.next(output.success, output.diagnostic_tail());
        }

        match state {
            AssemblyState::Done { subtitles_burned } => {
                let size_bytes = artifact_size(&request.output_path)?;
                let outcome = AssemblyOutcome {
                    output_path: request.output_path.clone(),
                    subtitles_burned,
                    size_bytes,
                };
                tracing::info!(
                    parent: &self.span,
                    output = %outcome.output_path.display(),
                    size_mb = %format!("{:.1}", outcome.size_mb()),
                    subtitles_burned,
                    "Video assembled"
                );
                Ok(outcome)
            }
            AssemblyState::Fatal { diagnostic } => {
                tracing::error!(parent: &self.span, "Encode failed with and without subtitles");
                Err(StoryreelError::assembly_failed(&diagnostic))
            }
            other => Err(StoryreelError::assembly_failed(&format!(
                "assembly stopped in state {other:?}"
            ))),
        }
    }
}

/// Size of a finished artifact; missing or empty output is a failure.
fn artifact_size(path: &Path) -> StoryreelResult<u64> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(StoryreelError::assembly_failed(&format!(
            "encoder reported success but {} is empty",
            path.display()
        ))),
        Err(err) => Err(StoryreelError::assembly_failed(&format!(
            "encoder reported success but {} is missing: {err}",
            path.display()
        ))),
    }
}
