//! Storyreel Renderer Sync
//!
//! Drives the external visual renderer through one playback:
//!
//! ```text
//! launch ─► wait_ready (≤30 s) ─► set_durations ─► start ─► CompletionSignal (≤600 s)
//!                                                               │
//!                          Recording { video, cue log } ◄── cue_log ─► shutdown ─► video_artifact
//! ```
//!
//! The renderer itself is opaque; [`ProcessRenderer`] talks to a bridge
//! process over newline-delimited JSON.

pub mod bridge;
pub mod driver;
pub mod renderer;
pub mod signal;

pub use bridge::*;
pub use driver::*;
pub use renderer::*;
pub use signal::*;
