//! Storyreel Script Model
//!
//! Defines the data contracts shared by the render pipeline:
//! - **Script:** Episodes, scenes, and narrated beats loaded from JSON
//! - **Actions:** Typed per-beat visual actions with an opaque fallback
//! - **Cue log:** Timestamped playback events emitted by the renderer
//!
//! Beat order is significant end-to-end: the n-th flattened beat is the
//! n-th narration clip and the n-th renderer duration.

pub mod action;
pub mod cue;
pub mod script;

pub use action::*;
pub use cue::*;
pub use script::*;
