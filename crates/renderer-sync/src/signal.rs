//! One-shot playback completion signal.

use storyreel_common::{StoryreelError, StoryreelResult};
use tokio::sync::oneshot;

/// How playback ended, as reported by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(String),
}

/// Renderer side of the signal. Consumed when fulfilled, so it can only
/// fire once.
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: oneshot::Sender<PlaybackOutcome>,
}

/// Driver side of the signal.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

/// Create a connected notifier/signal pair.
pub fn completion_channel() -> (CompletionNotifier, CompletionSignal) {
    let (tx, rx) = oneshot::channel();
    (CompletionNotifier { tx }, CompletionSignal { rx })
}

impl CompletionNotifier {
    /// Report that playback finished.
    pub fn complete(self) {
        let _ = self.tx.send(PlaybackOutcome::Completed);
    }

    /// Report that playback broke off.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(PlaybackOutcome::Failed(reason.into()));
    }
}

impl CompletionSignal {
    /// Wait for the renderer to report the end of playback.
    ///
    /// Has no timeout of its own; the caller bounds the wait. A notifier
    /// dropped without firing means the renderer went away.
    pub async fn wait(self) -> StoryreelResult<()> {
        match self.rx.await {
            Ok(PlaybackOutcome::Completed) => Ok(()),
            Ok(PlaybackOutcome::Failed(reason)) => Err(StoryreelError::recording_failed(
                format!("renderer reported playback failure: {reason}"),
            )),
            Err(_) => Err(StoryreelError::renderer(
                "renderer closed before signalling completion",
            )),
        }
    }
}
