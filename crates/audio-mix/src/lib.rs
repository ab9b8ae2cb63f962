//! Storyreel Audio Mix
//!
//! Turns the renderer cue log and the narration clips into three
//! time-aligned layers and one mixed track.
//!
//! ```text
//! CueLog ──partition──┬── narration marks + NarrationResults ──► TrackPlan (narration)
//!                     ├── music cues (first only) ──────────────► TrackPlan (music)
//!                     └── sfx cues ─────────────────────────────► TrackPlan (sfx)
//!                                                                      │ realize (ffmpeg)
//!                                            amix longest, no normalize ◄┘
//! ```
//!
//! Planning is pure: the same cue log and asset set always produce the
//! same plans and therefore the same ffmpeg argument vectors. Layers are
//! summed without loudness normalization.

pub mod assets;
pub mod mixdown;
pub mod plan;
pub mod timeline;
pub mod timing;

pub use assets::*;
pub use mixdown::*;
pub use plan::*;
pub use timeline::*;
pub use timing::*;
