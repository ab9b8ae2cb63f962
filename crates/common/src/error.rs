//! Error types shared across Storyreel crates.

use std::path::PathBuf;

/// Longest diagnostic tail carried by [`StoryreelError::AssemblyFailed`]
/// and [`StoryreelError::Transcode`].
pub const DIAGNOSTIC_TAIL_CHARS: usize = 500;

/// Top-level error type for Storyreel operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryreelError {
    /// Bad script path, wrong extension, or schema violation.
    #[error("Input error: {message}")]
    Input { message: String },

    /// A required intermediate file is missing.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Speech synthesis error: {message}")]
    Synthesis { message: String },

    #[error("Duration probe error: {message}")]
    DurationProbe { message: String },

    #[error("Renderer did not become ready within {timeout_secs}s")]
    RendererNotReady { timeout_secs: u64 },

    #[error("Renderer playback did not complete within {timeout_secs}s")]
    RenderTimeout { timeout_secs: u64 },

    #[error("Recording failed: {message}")]
    RecordingFailed { message: String },

    /// Protocol-level fault while talking to the renderer.
    #[error("Renderer error: {message}")]
    Renderer { message: String },

    #[error("Transcode error: {message}")]
    Transcode { message: String },

    #[error("Video assembly failed: {diagnostic}")]
    AssemblyFailed { diagnostic: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Render cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryreelError.
pub type StoryreelResult<T> = Result<T, StoryreelError>;

impl StoryreelError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis {
            message: msg.into(),
        }
    }

    pub fn duration_probe(msg: impl Into<String>) -> Self {
        Self::DurationProbe {
            message: msg.into(),
        }
    }

    pub fn recording_failed(msg: impl Into<String>) -> Self {
        Self::RecordingFailed {
            message: msg.into(),
        }
    }

    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::Renderer {
            message: msg.into(),
        }
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode {
            message: msg.into(),
        }
    }

    /// Build an assembly failure, keeping only the diagnostic tail.
    pub fn assembly_failed(diagnostic: &str) -> Self {
        Self::AssemblyFailed {
            diagnostic: tail_chars(diagnostic, DIAGNOSTIC_TAIL_CHARS).to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Short, stable name of the error kind for reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Synthesis { .. } => "synthesis",
            Self::DurationProbe { .. } => "duration_probe",
            Self::RendererNotReady { .. } => "renderer_not_ready",
            Self::RenderTimeout { .. } => "render_timeout",
            Self::RecordingFailed { .. } => "recording_failed",
            Self::Renderer { .. } => "renderer",
            Self::Transcode { .. } => "transcode",
            Self::AssemblyFailed { .. } => "assembly_failed",
            Self::Config { .. } => "config",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

/// Last `max_chars` characters of `text`, split on a char boundary.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
