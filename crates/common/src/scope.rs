//! Per-render logging scope.
//!
//! Each render invocation owns one [`RenderScope`]. Components receive a
//! child span from it at construction and log with `parent: &span`, so
//! every line carries the run id without any process-wide logger state.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::Span;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Structured logging capability scoped to a single render invocation.
#[derive(Debug, Clone)]
pub struct RenderScope {
    run_id: String,
    span: Span,
}

impl RenderScope {
    /// Open a scope for rendering `episode_id`.
    pub fn new(episode_id: &str) -> Self {
        let run_id = next_run_id();
        let span = tracing::info_span!("render", run_id = %run_id, episode = %episode_id);
        Self { run_id, span }
    }

    /// Identifier unique to this render invocation within the process.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Root span of the invocation.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Child span handed to a component at construction.
    pub fn component(&self, name: &'static str) -> Span {
        tracing::info_span!(parent: &self.span, "component", component = name)
    }
}

fn next_run_id() -> String {
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{}-{seq}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S"),
        std::process::id()
    )
}
