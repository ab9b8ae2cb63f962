//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{StoryreelError, StoryreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Override for the asset root (defaults to the script's project root).
    pub assets_dir: Option<PathBuf>,

    /// External renderer settings.
    pub renderer: RendererConfig,

    /// Narration defaults.
    pub narration: NarrationDefaults,

    /// Transcoder binaries.
    pub transcoder: TranscoderConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How to launch and wait on the external renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Bridge program that drives the renderer (e.g. a headless browser script).
    pub command: String,

    /// Extra arguments placed before the session arguments.
    pub args: Vec<String>,

    /// Bound on the readiness wait.
    pub ready_timeout_secs: u64,

    /// Bound on the playback completion wait.
    pub completion_timeout_secs: u64,

    /// File extensions accepted as the captured video artifact.
    pub video_extensions: Vec<String>,
}

/// Narration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationDefaults {
    /// Speech synthesizer executable.
    pub synthesizer_command: String,

    /// Voice used when the script does not name one.
    pub voice: String,

    /// Speaking rate adjustment (e.g. "+0%").
    pub rate: String,

    /// Upper bound on concurrent synthesis jobs.
    pub max_concurrency: usize,
}

/// Transcoder executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets_dir: None,
            renderer: RendererConfig::default(),
            narration: NarrationDefaults::default(),
            transcoder: TranscoderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "storyreel-renderer-bridge".to_string(),
            args: vec![],
            ready_timeout_secs: 30,
            completion_timeout_secs: 600,
            video_extensions: vec!["webm".to_string(), "mp4".to_string()],
        }
    }
}

impl Default for NarrationDefaults {
    fn default() -> Self {
        Self {
            synthesizer_command: "edge-tts".to_string(),
            voice: "en-US-GuyNeural".to_string(),
            rate: "+0%".to_string(),
            max_concurrency: 4,
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Reject settings a render cannot run with.
    pub fn validate(&self) -> StoryreelResult<()> {
        let renderer = &self.renderer;
        if renderer.command.trim().is_empty() {
            return Err(StoryreelError::config("renderer.command is empty"));
        }
        if renderer.ready_timeout_secs == 0 || renderer.completion_timeout_secs == 0 {
            return Err(StoryreelError::config("renderer timeouts must be positive"));
        }
        if renderer.video_extensions.is_empty() {
            return Err(StoryreelError::config(
                "renderer.video_extensions must name at least one extension",
            ));
        }
        for (key, value) in [
            ("narration.synthesizer_command", &self.narration.synthesizer_command),
            ("transcoder.ffmpeg", &self.transcoder.ffmpeg),
            ("transcoder.ffprobe", &self.transcoder.ffprobe),
        ] {
            if value.trim().is_empty() {
                return Err(StoryreelError::config(format!("{key} is empty")));
            }
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}
