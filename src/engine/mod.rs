// src/engine/mod.rs

//! Orchestration engine for hdlrun.
//!
//! This module ties together:
//! - the per-project run state machines ([`crate::state`])
//! - the executor backend that spawns and supervises toolchain processes
//! - the artifact resolver
//! - the collaborators the engine talks to: a [`Notifier`] for
//!   state-transition events and a [`Confirmer`] for yes/no prompts
//!
//! The coordinator in [`coordinator`] is the single entry point; everything
//! it emits flows through [`EngineEvent`].

pub mod coordinator;
pub mod dispatch;
pub mod notifier;
pub mod prompt;

use crate::exec::ExecutionStatus;
use crate::state::{RunId, RunKind, RunPhase};
use crate::types::{ProjectId, ReportKind, TaskId};

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
}

/// Events flowing from the engine to the presentation layer.
///
/// Emitted synchronously at the transition they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A tracked run was accepted and its process started.
    RunStarted {
        project: ProjectId,
        kind: RunKind,
        run_id: RunId,
        pid: Option<u32>,
    },
    /// A tracked run reached its terminal phase.
    RunFinished {
        project: ProjectId,
        kind: RunKind,
        run_id: RunId,
        status: ExecutionStatus,
        phase: RunPhase,
    },
    /// Task decorations of `project` are stale.
    StateRefresh { project: ProjectId },
    /// A cancellation was confirmed.
    TaskStopped { project: ProjectId, kind: RunKind },
    /// An artifact was resolved and is ready to present.
    ArtifactReady {
        project: ProjectId,
        task: TaskId,
        report: ReportKind,
    },
    Message {
        project: Option<ProjectId>,
        level: MessageLevel,
        text: String,
    },
}

/// Receives engine events. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: EngineEvent);
}

pub use coordinator::{MultiProjectCoordinator, RunOutcome, RunTicket, StopOutcome};
pub use dispatch::{DispatchTable, TaskHandler};
pub use notifier::{ChannelNotifier, TracingNotifier};
pub use prompt::{AutoConfirm, ConfirmRequest, Confirmer, TerminalConfirmer};
