//! Storyreel Common Utilities
//!
//! Shared infrastructure for all Storyreel crates:
//! - Error taxonomy and result aliases
//! - Run clock for phase timing and report timestamps
//! - Tracing/logging initialization and the per-render logging scope
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod scope;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use scope::*;
