//! Storyreel Assembly
//!
//! Muxes the recorded video, the mixed audio track and the subtitle file
//! into the final MP4.
//!
//! ```text
//! Start ──► AttemptPrimary (subtitles burned in)
//!              │ ok ──────────────────────────► Done
//!              └ non-zero exit ──► AttemptFallback (no subtitle filter)
//!                                     │ ok ──► Done
//!                                     └ non-zero exit ──► Fatal (AssemblyFailed)
//! ```
//!
//! Output length is the shorter of the mapped video and audio streams.

pub mod engine;
pub mod profile;

pub use engine::*;
pub use profile::*;
