//! Episode script types and loading.
//!
//! An episode is a list of scenes, each holding ordered beats. The
//! pipeline works on the flattened beat list, so [`EpisodeScript::all_beats`]
//! is the single source of beat indices.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::BeatAction;

/// Top-level episode script file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeScript {
    /// Episode metadata.
    pub episode: EpisodeMeta,

    /// Asset manifest, passed through to the renderer untouched.
    #[serde(default)]
    pub assets: Map<String, Value>,

    /// Ordered scenes (at least one).
    pub scenes: Vec<Scene>,
}

/// Episode metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMeta {
    /// Identifier used for output file names.
    pub id: String,

    /// Human-readable title.
    pub title: String,

    /// Free-form target length (informational).
    #[serde(default = "default_duration_target")]
    pub duration_target: String,

    /// Output frame size.
    #[serde(default)]
    pub resolution: Resolution,

    /// Narration voice settings.
    #[serde(default)]
    pub narration: NarrationSettings,
}

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Voice and speaking rate for the whole episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    pub voice: String,
    pub rate: String,
}

/// A scene: background, cast, props, and its beats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicCue>,
    #[serde(default)]
    pub camera: CameraState,
    #[serde(default)]
    pub characters_on_stage: Vec<CharacterPlacement>,
    #[serde(default)]
    pub props_on_stage: Vec<PropPlacement>,
    #[serde(default)]
    pub beats: Vec<Beat>,
}

/// Background music requested by a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicCue {
    pub track: String,
    #[serde(default = "default_scene_music_volume")]
    pub volume: f64,
    /// Fade-in in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
}

/// Initial camera framing of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

/// A character placed on stage when the scene opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterPlacement {
    pub id: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub position: Map<String, Value>,
    #[serde(default = "default_character_state")]
    pub state: String,
    #[serde(default)]
    pub flip: bool,
}

/// A prop placed on stage when the scene opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropPlacement {
    pub id: String,
    pub position: Map<String, Value>,
    #[serde(default = "default_prop_scale")]
    pub scale: f64,
}

/// Smallest narrated unit of an episode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Beat {
    /// Narration text; may be empty for silent beats.
    #[serde(default)]
    pub narration: String,

    /// Visual actions run while the beat plays.
    #[serde(default)]
    pub actions: Vec<BeatAction>,
}

impl Beat {
    /// Whether this beat has anything to speak.
    pub fn is_narrated(&self) -> bool {
        !self.narration.trim().is_empty()
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            voice: "en-US-GuyNeural".to_string(),
            rate: "+0%".to_string(),
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

fn default_duration_target() -> String {
    "5-7 min".to_string()
}

fn default_scene_music_volume() -> f64 {
    0.5
}

fn default_character_state() -> String {
    "idle".to_string()
}

fn default_prop_scale() -> f64 {
    1.0
}

impl EpisodeScript {
    /// Parse and validate a script from JSON text.
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ScriptError> {
        let script: EpisodeScript =
            serde_json::from_str(raw).map_err(|e| ScriptError::Schema {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        script.validate(path)?;
        Ok(script)
    }

    fn validate(&self, path: &Path) -> Result<(), ScriptError> {
        if self.scenes.is_empty() {
            return Err(ScriptError::Schema {
                path: path.to_path_buf(),
                message: "`scenes` must contain at least one scene".to_string(),
            });
        }
        if self.episode.id.trim().is_empty() {
            return Err(ScriptError::Schema {
                path: path.to_path_buf(),
                message: "`episode.id` must not be empty".to_string(),
            });
        }
        if !is_file_stem(&self.episode.id) {
            return Err(ScriptError::Schema {
                path: path.to_path_buf(),
                message: format!(
                    "`episode.id` must be a plain file name, got `{}`",
                    self.episode.id
                ),
            });
        }
        Ok(())
    }

    /// Flatten all beats across all scenes in order.
    pub fn all_beats(&self) -> Vec<&Beat> {
        self.scenes.iter().flat_map(|scene| scene.beats.iter()).collect()
    }

    /// Narration text of every beat, in beat order.
    pub fn narration_texts(&self) -> Vec<String> {
        self.all_beats()
            .into_iter()
            .map(|beat| beat.narration.clone())
            .collect()
    }

    /// Number of beats with non-empty narration.
    pub fn narrated_beat_count(&self) -> usize {
        self.all_beats()
            .into_iter()
            .filter(|beat| beat.is_narrated())
            .count()
    }
}

/// Output files are named after the id, so it must stay one path component.
fn is_file_stem(id: &str) -> bool {
    let mut components = Path::new(id).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == id
    );
    single && !id.contains(['/', '\\'])
}

/// Load and validate an episode script from a JSON file.
pub fn load_episode(path: impl AsRef<Path>) -> Result<EpisodeScript, ScriptError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ScriptError::NotFound {
            path: path.to_path_buf(),
        });
    }

    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(ScriptError::InvalidExtension {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|e| ScriptError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let script = EpisodeScript::from_json(&raw, path)?;

    tracing::info!(
        title = %script.episode.title,
        scenes = script.scenes.len(),
        beats = script.all_beats().len(),
        narrated = script.narrated_beat_count(),
        "Loaded episode"
    );

    Ok(script)
}

/// Errors that can occur when loading a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Episode script not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Expected .json file, got: {path} (extension `{extension}`)")]
    InvalidExtension { path: PathBuf, extension: String },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Schema error in {path}: {message}")]
    Schema { path: PathBuf, message: String },
}
