//! Storyreel Narration
//!
//! Narration Timing Engine: one speech clip per beat, its measured
//! duration, and its subtitle fragment. The ordered duration list is the
//! timing contract handed to the renderer, so results are always returned
//! in beat order no matter how synthesis is scheduled.

pub mod engine;
pub mod subtitles;
pub mod synthesizer;

pub use engine::*;
pub use subtitles::*;
pub use synthesizer::*;
