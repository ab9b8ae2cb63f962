//! Per-beat visual actions.
//!
//! Actions are opaque to the render core; they are typed here so scripts
//! are validated once on load. Kinds this model does not know are kept
//! verbatim as [`OpaqueAction`] and serialize back unchanged.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A point on the stage, in renderer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagePoint {
    pub x: f64,
    pub y: f64,
}

/// Action kinds understood by the renderer.
///
/// Millisecond fields are kept as `f64` because scripts are hand-written
/// and the renderer accepts fractional values. Fields a variant does not
/// name are kept in `extra` and serialize back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownAction {
    CameraPan {
        to: StagePoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    CameraZoom {
        to: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    CameraShake {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intensity: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    CharacterState {
        character: String,
        state: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    CharacterMove {
        character: String,
        to: StagePoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Sfx {
        clip: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    MusicChange {
        track: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fade_in: Option<f64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

const KNOWN_KINDS: &[&str] = &[
    "camera_pan",
    "camera_zoom",
    "camera_shake",
    "character_state",
    "character_move",
    "sfx",
    "music_change",
];

impl KnownAction {
    /// Wire name of the action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            KnownAction::CameraPan { .. } => "camera_pan",
            KnownAction::CameraZoom { .. } => "camera_zoom",
            KnownAction::CameraShake { .. } => "camera_shake",
            KnownAction::CharacterState { .. } => "character_state",
            KnownAction::CharacterMove { .. } => "character_move",
            KnownAction::Sfx { .. } => "sfx",
            KnownAction::MusicChange { .. } => "music_change",
        }
    }
}

/// An action of a kind this model does not recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueAction {
    /// Value of the `type` field.
    pub kind: String,
    /// Every other field, untouched.
    pub payload: Map<String, Value>,
}

/// A visual action attached to a beat.
#[derive(Debug, Clone, PartialEq)]
pub enum BeatAction {
    Known(KnownAction),
    Opaque(OpaqueAction),
}

impl BeatAction {
    /// Wire name of the action kind.
    pub fn kind(&self) -> &str {
        match self {
            BeatAction::Known(action) => action.kind(),
            BeatAction::Opaque(action) => &action.kind,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, BeatAction::Opaque(_))
    }
}

impl<'de> Deserialize<'de> for BeatAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(mut payload) = value else {
            return Err(de::Error::custom("beat action must be a JSON object"));
        };
        let kind = match payload.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(de::Error::custom("beat action `type` must be a string")),
            None => return Err(de::Error::missing_field("type")),
        };

        if KNOWN_KINDS.contains(&kind.as_str()) {
            // A known kind with a malformed payload is a schema error, not opaque.
            return serde_json::from_value(Value::Object(payload))
                .map(BeatAction::Known)
                .map_err(|e| de::Error::custom(format!("invalid `{kind}` action: {e}")));
        }

        payload.remove("type");
        Ok(BeatAction::Opaque(OpaqueAction { kind, payload }))
    }
}

impl Serialize for BeatAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BeatAction::Known(action) => action.serialize(serializer),
            BeatAction::Opaque(action) => {
                let mut object = Map::with_capacity(action.payload.len() + 1);
                object.insert("type".to_string(), Value::String(action.kind.clone()));
                for (key, value) in &action.payload {
                    object.insert(key.clone(), value.clone());
                }
                object.serialize(serializer)
            }
        }
    }
}
