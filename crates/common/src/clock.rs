//! Run clock for phase timing.
//!
//! A render is anchored to a monotonic epoch taken when the invocation
//! starts. Phase durations are measured against it, and the wall-clock
//! start time is kept for the render report.

use std::time::Instant;

use chrono::{DateTime, Utc};

/// Monotonic clock anchored at the start of a render invocation.
#[derive(Debug, Clone)]
pub struct RunClock {
    /// The instant the run started.
    epoch: Instant,

    /// Wall-clock time at epoch.
    started_at: DateTime<Utc>,
}

impl RunClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at run start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Start timing a named phase.
    pub fn phase(&self, name: &'static str) -> PhaseTimer {
        PhaseTimer {
            name,
            started: Instant::now(),
        }
    }
}

/// Measures a single pipeline phase.
#[derive(Debug)]
pub struct PhaseTimer {
    name: &'static str,
    started: Instant,
}

impl PhaseTimer {
    /// Phase name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Finish the phase and return its duration in milliseconds.
    pub fn finish(self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
