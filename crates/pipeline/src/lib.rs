//! Storyreel Pipeline
//!
//! Drives one render invocation through four strictly sequential phases:
//!
//! ```text
//! script.json ──load──► timing ──durations──► recording ──cue log──► mixing ──mixed.m4a──► assembly
//!                         │                      │                                             │
//!                         └── <id>.srt           └── video artifact ───────────────────────────┘
//!                                                                                               ▼
//!                                                                         <id>.mp4 + <id>.render.json
//! ```
//!
//! Intermediate files live in a temporary directory owned by the
//! invocation. It is removed when the render returns, fails, or is
//! dropped mid-flight.

pub mod orchestrator;
pub mod report;

pub use orchestrator::*;
pub use report::*;
