// src/engine/notifier.rs

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{EngineEvent, MessageLevel, Notifier};

/// Notifier that only logs. Used by the CLI, where the log is the UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: EngineEvent) {
        match event {
            EngineEvent::RunStarted {
                project,
                kind,
                run_id,
                pid,
            } => info!(project = %project, task = %kind, run_id = run_id.get(), ?pid, "run started"),
            EngineEvent::RunFinished {
                project,
                kind,
                run_id,
                status,
                phase,
            } => info!(
                project = %project,
                task = %kind,
                run_id = run_id.get(),
                ?status,
                ?phase,
                "run finished"
            ),
            EngineEvent::StateRefresh { project } => debug!(project = %project, "state refresh"),
            EngineEvent::TaskStopped { project, kind } => {
                info!(project = %project, task = %kind, "task stopped")
            }
            EngineEvent::ArtifactReady {
                project,
                task,
                report,
            } => info!(project = %project, task = %task, report = %report, "artifact ready"),
            EngineEvent::Message {
                project,
                level: MessageLevel::Info,
                text,
            } => info!(project = ?project.as_ref().map(|p| p.as_str()), "{text}"),
            EngineEvent::Message {
                project,
                level: MessageLevel::Warning,
                text,
            } => warn!(project = ?project.as_ref().map(|p| p.as_str()), "{text}"),
        }
    }
}

/// Forwards every event into an unbounded channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped; discarding engine event");
        }
    }
}
