//! Renderer Synchronization Driver.

use std::sync::Arc;
use std::time::Duration;

use storyreel_common::{RendererConfig, StoryreelError, StoryreelResult};
use tokio::time::timeout;
use tracing::Span;

use crate::renderer::{Recording, RenderSession, Renderer, RendererLauncher};

/// Bounds on the two open-ended waits of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimeouts {
    pub ready: Duration,
    pub completion: Duration,
}

impl Default for SyncTimeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(30),
            completion: Duration::from_secs(600),
        }
    }
}

impl From<&RendererConfig> for SyncTimeouts {
    fn from(config: &RendererConfig) -> Self {
        Self {
            ready: Duration::from_secs(config.ready_timeout_secs),
            completion: Duration::from_secs(config.completion_timeout_secs),
        }
    }
}

/// Runs one playback on a renderer and harvests its output.
pub struct SyncDriver {
    launcher: Arc<dyn RendererLauncher>,
    timeouts: SyncTimeouts,
    span: Span,
}

impl SyncDriver {
    pub fn new(launcher: Arc<dyn RendererLauncher>, timeouts: SyncTimeouts) -> Self {
        Self {
            launcher,
            timeouts,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn timeouts(&self) -> SyncTimeouts {
        self.timeouts
    }

    /// Play the episode with the given per-beat durations and return the
    /// recording.
    ///
    /// The renderer is shut down on every path once launched.
    pub async fn record(
        &self,
        session: &RenderSession,
        durations_ms: &[u64],
    ) -> StoryreelResult<Recording> {
        tracing::info!(
            parent: &self.span,
            renderer = self.launcher.name(),
            beats = durations_ms.len(),
            width = session.resolution.width,
            height = session.resolution.height,
            "Launching renderer"
        );
        let mut renderer = self.launcher.launch(session).await?;

        let handshake = self.handshake(renderer.as_mut(), durations_ms).await;

        if let Err(err) = renderer.shutdown().await {
            tracing::warn!(parent: &self.span, error = %err, "Renderer shutdown failed");
        }

        let cue_log = handshake?;

        let video_path = renderer.video_artifact().await?.ok_or_else(|| {
            StoryreelError::recording_failed(format!(
                "no video artifact found in {}",
                session.video_dir.display()
            ))
        })?;

        let size_bytes = tokio::fs::metadata(&video_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size_bytes == 0 {
            return Err(StoryreelError::recording_failed(format!(
                "video artifact is empty: {}",
                video_path.display()
            )));
        }

        let recording = Recording {
            video_path,
            cue_log,
            size_bytes,
        };
        tracing::info!(
            parent: &self.span,
            video = %recording.video_path.display(),
            size_mb = %format!("{:.1}", recording.size_mb()),
            cues = recording.cue_log.len(),
            "Recorded playback"
        );
        Ok(recording)
    }

    async fn handshake(
        &self,
        renderer: &mut dyn Renderer,
        durations_ms: &[u64],
    ) -> StoryreelResult<storyreel_script_model::CueLog> {
        timeout(self.timeouts.ready, renderer.wait_ready())
            .await
            .map_err(|_| StoryreelError::RendererNotReady {
                timeout_secs: self.timeouts.ready.as_secs(),
            })??;

        renderer.set_durations(durations_ms).await?;

        let signal = renderer.start().await?;
        tracing::info!(parent: &self.span, beats = durations_ms.len(), "Playback started");

        timeout(self.timeouts.completion, signal.wait())
            .await
            .map_err(|_| StoryreelError::RenderTimeout {
                timeout_secs: self.timeouts.completion.as_secs(),
            })??;

        let cue_log = renderer.cue_log().await?;
        tracing::debug!(parent: &self.span, cues = cue_log.len(), "Retrieved cue log");
        Ok(cue_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{completion_channel, CompletionNotifier, CompletionSignal};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use storyreel_script_model::{CueLog, CueLogEntry, Resolution};

    #[derive(Clone, Copy, PartialEq)]
    enum Behaviour {
        Normal,
        NeverReady,
        NeverCompletes,
        NoArtifact,
        PlaybackFails,
    }

    struct FakeRenderer {
        behaviour: Behaviour,
        video_dir: PathBuf,
        received: Arc<Mutex<Vec<u64>>>,
        shut_down: Arc<AtomicBool>,
        _held: Option<CompletionNotifier>,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn wait_ready(&mut self) -> StoryreelResult<()> {
            if self.behaviour == Behaviour::NeverReady {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn set_durations(&mut self, durations_ms: &[u64]) -> StoryreelResult<()> {
            self.received.lock().unwrap().extend_from_slice(durations_ms);
            Ok(())
        }

        async fn start(&mut self) -> StoryreelResult<CompletionSignal> {
            let (notifier, signal) = completion_channel();
            match self.behaviour {
                Behaviour::NeverCompletes => self._held = Some(notifier),
                Behaviour::PlaybackFails => notifier.fail("asset 404"),
                _ => {
                    if self.behaviour != Behaviour::NoArtifact {
                        std::fs::write(self.video_dir.join("take.webm"), b"webm").unwrap();
                    }
                    notifier.complete();
                }
            }
            Ok(signal)
        }

        async fn cue_log(&mut self) -> StoryreelResult<CueLog> {
            Ok(CueLog::new(vec![
                CueLogEntry::narration_mark(0, 10),
                CueLogEntry::sfx("gong", 500, Some(0.8)),
            ]))
        }

        async fn shutdown(&mut self) -> StoryreelResult<()> {
            self.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn video_artifact(&mut self) -> StoryreelResult<Option<PathBuf>> {
            crate::renderer::locate_video_artifact(&self.video_dir, &["webm".to_string()])
        }
    }

    struct FakeLauncher {
        behaviour: Behaviour,
        received: Arc<Mutex<Vec<u64>>>,
        shut_down: Arc<AtomicBool>,
    }

    impl FakeLauncher {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                received: Arc::new(Mutex::new(Vec::new())),
                shut_down: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl RendererLauncher for FakeLauncher {
        async fn launch(&self, session: &RenderSession) -> StoryreelResult<Box<dyn Renderer>> {
            Ok(Box::new(FakeRenderer {
                behaviour: self.behaviour,
                video_dir: session.video_dir.clone(),
                received: self.received.clone(),
                shut_down: self.shut_down.clone(),
                _held: None,
            }))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn short_timeouts() -> SyncTimeouts {
        SyncTimeouts {
            ready: Duration::from_millis(50),
            completion: Duration::from_millis(50),
        }
    }

    async fn run(behaviour: Behaviour) -> (StoryreelResult<Recording>, Arc<FakeLauncher>) {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(FakeLauncher::new(behaviour));
        let driver = SyncDriver::new(launcher.clone(), short_timeouts());
        let session = RenderSession {
            script_path: PathBuf::from("scripts/ep01.json"),
            video_dir: dir.path().to_path_buf(),
            resolution: Resolution::default(),
        };
        let result = driver.record(&session, &[1_200, 0, 800]).await;
        (result, launcher)
    }

    #[tokio::test]
    async fn test_successful_handshake() {
        let (result, launcher) = run(Behaviour::Normal).await;
        let recording = result.unwrap();
        assert!(recording.video_path.ends_with("take.webm"));
        assert_eq!(recording.size_bytes, 4);
        assert_eq!(recording.cue_log.len(), 2);
        assert_eq!(*launcher.received.lock().unwrap(), vec![1_200, 0, 800]);
        assert!(launcher.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_not_ready_times_out() {
        let (result, launcher) = run(Behaviour::NeverReady).await;
        assert!(matches!(
            result.unwrap_err(),
            StoryreelError::RendererNotReady { .. }
        ));
        assert!(launcher.received.lock().unwrap().is_empty());
        assert!(launcher.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_completion_times_out() {
        let (result, launcher) = run(Behaviour::NeverCompletes).await;
        assert!(matches!(
            result.unwrap_err(),
            StoryreelError::RenderTimeout { .. }
        ));
        assert!(launcher.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_recording_failed() {
        let (result, launcher) = run(Behaviour::NoArtifact).await;
        assert_eq!(result.unwrap_err().kind(), "recording_failed");
        assert!(launcher.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_playback_failure_is_recording_failed() {
        let (result, _) = run(Behaviour::PlaybackFails).await;
        assert_eq!(result.unwrap_err().kind(), "recording_failed");
    }

    #[test]
    fn test_timeouts_from_config() {
        let timeouts = SyncTimeouts::from(&RendererConfig::default());
        assert_eq!(timeouts, SyncTimeouts::default());
    }
}
