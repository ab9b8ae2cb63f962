//! Process bridge renderer.
//!
//! The visual renderer runs inside a separate bridge process (typically a
//! headless browser driver). The bridge receives the session on its
//! command line and speaks newline-delimited JSON:
//!
//! ```text
//! stdin  ◄─ {"cmd":"set_durations","durations":[1200,0,800]}
//!           {"cmd":"start"} | {"cmd":"get_cue_log"} | {"cmd":"shutdown"}
//! stdout ─► {"event":"ready"} | {"event":"complete"}
//!           {"event":"cue_log","entries":[...]} | {"event":"error","message":"..."}
//! ```
//!
//! Lines on stdout that are not protocol events are logged and ignored.
//! An `error` event fails playback while it runs and answers `get_cue_log`
//! while that request is outstanding; at any other time it is only logged.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyreel_common::{RendererConfig, StoryreelError, StoryreelResult};
use storyreel_script_model::CueLog;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::renderer::{locate_video_artifact, RenderSession, Renderer, RendererLauncher};
use crate::signal::{completion_channel, CompletionNotifier, CompletionSignal};

/// How long the bridge gets to exit after `shutdown` before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Command sent to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BridgeCommand {
    SetDurations { durations: Vec<u64> },
    Start,
    GetCueLog,
    Shutdown,
}

/// Event emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    Ready,
    Complete,
    CueLog { entries: CueLog },
    Error { message: String },
}

type PendingCompletion = Arc<Mutex<Option<CompletionNotifier>>>;

/// Launches [`ProcessRenderer`]s from the renderer configuration.
#[derive(Debug, Clone)]
pub struct ProcessRendererLauncher {
    config: RendererConfig,
}

impl ProcessRendererLauncher {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Full argument list for a session.
    pub fn session_args(&self, session: &RenderSession) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.extend([
            "--script".to_string(),
            session.script_path.display().to_string(),
            "--video-dir".to_string(),
            session.video_dir.display().to_string(),
            "--width".to_string(),
            session.resolution.width.to_string(),
            "--height".to_string(),
            session.resolution.height.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl RendererLauncher for ProcessRendererLauncher {
    async fn launch(&self, session: &RenderSession) -> StoryreelResult<Box<dyn Renderer>> {
        let mut child = Command::new(&self.config.command)
            .args(self.session_args(session))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StoryreelError::renderer(format!(
                    "Failed to start renderer bridge {}: {e}",
                    self.config.command
                ))
            })?;

        tracing::info!(
            command = %self.config.command,
            pid = ?child.id(),
            "Renderer bridge started"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoryreelError::renderer("Failed to capture bridge stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StoryreelError::renderer("Failed to capture bridge stdout"))?;

        Ok(Box::new(ProcessRenderer::attach(
            child,
            stdin,
            stdout,
            session.video_dir.clone(),
            self.config.video_extensions.clone(),
            Duration::from_secs(self.config.ready_timeout_secs),
        )))
    }

    fn name(&self) -> &str {
        &self.config.command
    }
}

/// Renderer running in a bridge process.
pub struct ProcessRenderer {
    child: Child,
    stdin: Option<ChildStdin>,
    ready: Option<oneshot::Receiver<()>>,
    pending_completion: PendingCompletion,
    replies: mpsc::UnboundedReceiver<BridgeEvent>,
    awaiting_reply: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    video_dir: PathBuf,
    video_extensions: Vec<String>,
    reply_timeout: Duration,
}

impl ProcessRenderer {
    fn attach(
        child: Child,
        stdin: ChildStdin,
        stdout: ChildStdout,
        video_dir: PathBuf,
        video_extensions: Vec<String>,
        reply_timeout: Duration,
    ) -> Self {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let pending_completion: PendingCompletion = Arc::new(Mutex::new(None));
        let awaiting_reply = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(route_events(
            stdout,
            ready_tx,
            pending_completion.clone(),
            awaiting_reply.clone(),
            reply_tx,
        ));

        Self {
            child,
            stdin: Some(stdin),
            ready: Some(ready_rx),
            pending_completion,
            replies: reply_rx,
            awaiting_reply,
            reader,
            video_dir,
            video_extensions,
            reply_timeout,
        }
    }

    async fn send(&mut self, command: &BridgeCommand) -> StoryreelResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StoryreelError::renderer("bridge stdin already closed"))?;
        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StoryreelError::renderer(format!("Failed to write to bridge: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| StoryreelError::renderer(format!("Failed to flush bridge stdin: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    async fn wait_ready(&mut self) -> StoryreelResult<()> {
        let ready = self
            .ready
            .take()
            .ok_or_else(|| StoryreelError::renderer("wait_ready called twice"))?;
        ready
            .await
            .map_err(|_| StoryreelError::renderer("renderer bridge exited before becoming ready"))
    }

    async fn set_durations(&mut self, durations_ms: &[u64]) -> StoryreelResult<()> {
        self.send(&BridgeCommand::SetDurations {
            durations: durations_ms.to_vec(),
        })
        .await
    }

    async fn start(&mut self) -> StoryreelResult<CompletionSignal> {
        let (notifier, signal) = completion_channel();
        if let Ok(mut pending) = self.pending_completion.lock() {
            *pending = Some(notifier);
        }
        self.send(&BridgeCommand::Start).await?;
        Ok(signal)
    }

    async fn cue_log(&mut self) -> StoryreelResult<CueLog> {
        while let Ok(stale) = self.replies.try_recv() {
            tracing::debug!(event = ?stale, "Discarding unsolicited bridge event");
        }
        self.awaiting_reply.store(true, Ordering::SeqCst);
        let sent = self.send(&BridgeCommand::GetCueLog).await;
        let reply = match sent {
            Ok(()) => tokio::time::timeout(self.reply_timeout, self.replies.recv()).await,
            Err(err) => {
                self.awaiting_reply.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        self.awaiting_reply.store(false, Ordering::SeqCst);
        let reply =
            reply.map_err(|_| StoryreelError::renderer("timed out waiting for cue log"))?;
        match reply {
            Some(BridgeEvent::CueLog { entries }) => Ok(entries),
            Some(BridgeEvent::Error { message }) => Err(StoryreelError::renderer(message)),
            Some(other) => Err(StoryreelError::renderer(format!(
                "unexpected bridge reply: {other:?}"
            ))),
            None => Err(StoryreelError::renderer(
                "renderer bridge exited before sending cue log",
            )),
        }
    }

    async fn shutdown(&mut self) -> StoryreelResult<()> {
        if self.stdin.is_some() {
            if let Err(err) = self.send(&BridgeCommand::Shutdown).await {
                tracing::debug!(error = %err, "Bridge did not accept shutdown command");
            }
        }
        // Closing stdin is the fallback shutdown request.
        self.stdin = None;

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Renderer bridge exited");
                Ok(())
            }
            Ok(Err(err)) => Err(StoryreelError::renderer(format!(
                "Failed to wait on renderer bridge: {err}"
            ))),
            Err(_) => {
                tracing::warn!("Renderer bridge ignored shutdown; killing");
                self.child.kill().await.map_err(|e| {
                    StoryreelError::renderer(format!("Failed to kill renderer bridge: {e}"))
                })
            }
        }
    }

    async fn video_artifact(&mut self) -> StoryreelResult<Option<PathBuf>> {
        locate_video_artifact(&self.video_dir, &self.video_extensions)
    }
}

impl Drop for ProcessRenderer {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn route_events(
    stdout: ChildStdout,
    ready: oneshot::Sender<()>,
    pending_completion: PendingCompletion,
    awaiting_reply: Arc<AtomicBool>,
    replies: mpsc::UnboundedSender<BridgeEvent>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "Failed reading renderer bridge output");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<BridgeEvent>(trimmed) {
            Ok(BridgeEvent::Ready) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
            Ok(BridgeEvent::Complete) => {
                if let Some(notifier) = take_pending(&pending_completion) {
                    notifier.complete();
                }
            }
            Ok(BridgeEvent::Error { message }) => {
                tracing::warn!(%message, "Renderer bridge reported an error");
                if let Some(notifier) = take_pending(&pending_completion) {
                    notifier.fail(message);
                } else if awaiting_reply.load(Ordering::SeqCst) {
                    let _ = replies.send(BridgeEvent::Error { message });
                }
            }
            Ok(event) => {
                let _ = replies.send(event);
            }
            Err(_) => tracing::debug!(line = trimmed, "Renderer bridge output"),
        }
    }

    // Bridge closed stdout: unblock anyone still waiting.
    drop(take_pending(&pending_completion));
}

fn take_pending(pending: &PendingCompletion) -> Option<CompletionNotifier> {
    pending.lock().ok().and_then(|mut slot| slot.take())
}
