//! Storyreel Transcoder
//!
//! Every media operation in the pipeline goes through ffmpeg or ffprobe,
//! always with an explicit argument vector and never through a shell.
//!
//! ```text
//! FfmpegArgs ──► Transcoder::run ──► TranscodeOutput { success, exit_code, stderr }
//!                       │
//!                       └── run_checked ──► StoryreelError::Transcode (stderr tail)
//!
//! path ──► DurationProbe::probe_duration_ms ──► u64 ms
//! ```

pub mod args;
pub mod ffmpeg;
pub mod runner;

pub use args::*;
pub use ffmpeg::*;
pub use runner::*;
