// src/state/run_state.rs

//! Per-project run state machine.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::exec::ExecutionStatus;
use crate::types::TaskId;

/// Phase of a project.
///
/// `Finished` and `Failed` are transient: the coordinator settles them back
/// to `Idle` in the same step that observed the terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Finished,
    Failed,
}

/// What a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunKind {
    Task(TaskId),
    Clean,
}

impl RunKind {
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            RunKind::Task(t) => Some(t),
            RunKind::Clean => None,
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Task(t) => write!(f, "{t}"),
            RunKind::Clean => f.write_str("clean"),
        }
    }
}

/// Public view of one task's state, as shown next to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Never ran (or its results were cleaned).
    NotRun,
    Running,
    Finished,
    /// Last run failed or was cancelled.
    Failed,
}

/// Monotonically increasing identifier of one accepted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `begin` refused because another run is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub running: RunKind,
}

/// Single-flight run state of one project.
///
/// Pure data: no channels, no processes. The coordinator drives it.
#[derive(Debug, Clone)]
pub struct ProjectRunState {
    phase: RunPhase,
    /// Task currently running, or the most recent one.
    current: Option<RunKind>,
    active_run: Option<RunId>,
    run_counter: u64,
    history: HashMap<TaskId, ExecutionStatus>,
}

impl Default for ProjectRunState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectRunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            current: None,
            active_run: None,
            run_counter: 0,
            history: HashMap::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn current(&self) -> Option<&RunKind> {
        self.current.as_ref()
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    /// `Idle -> Running`. Rejected while another run is active.
    pub fn begin(&mut self, kind: RunKind) -> Result<RunId, Rejected> {
        if self.phase == RunPhase::Running {
            let running = self.current.clone().unwrap_or(RunKind::Clean);
            debug!(requested = %kind, running = %running, "run rejected; project busy");
            return Err(Rejected { running });
        }

        if self.phase != RunPhase::Idle {
            // Terminal phase that was never settled.
            self.settle();
        }

        self.run_counter += 1;
        let id = RunId(self.run_counter);
        self.phase = RunPhase::Running;
        self.current = Some(kind);
        self.active_run = Some(id);
        Ok(id)
    }

    /// `Running -> Finished | Failed` for the run `id`.
    ///
    /// Returns the terminal phase, or `None` when `id` is not the active run
    /// (a stale or duplicate completion), in which case nothing changes.
    pub fn complete(&mut self, id: RunId, status: ExecutionStatus) -> Option<RunPhase> {
        if self.active_run != Some(id) || self.phase != RunPhase::Running {
            warn!(
                run_id = id.get(),
                active = ?self.active_run,
                "ignoring completion for a run that is not active"
            );
            return None;
        }

        self.active_run = None;
        self.phase = if status == ExecutionStatus::Finished {
            RunPhase::Finished
        } else {
            RunPhase::Failed
        };

        match &self.current {
            Some(RunKind::Task(task)) => {
                self.history.insert(task.clone(), status);
            }
            Some(RunKind::Clean) if status == ExecutionStatus::Finished => {
                // Generated reports are gone; every task starts over.
                self.history.clear();
            }
            _ => {}
        }

        Some(self.phase)
    }

    /// `Finished | Failed -> Idle`. Returns whether anything changed.
    pub fn settle(&mut self) -> bool {
        match self.phase {
            RunPhase::Finished | RunPhase::Failed => {
                self.phase = RunPhase::Idle;
                true
            }
            RunPhase::Idle | RunPhase::Running => false,
        }
    }

    pub fn task_state(&self, task: &TaskId) -> TaskState {
        if self.phase == RunPhase::Running && self.current.as_ref().and_then(RunKind::task) == Some(task)
        {
            return TaskState::Running;
        }

        match self.history.get(task) {
            None => TaskState::NotRun,
            Some(ExecutionStatus::Finished) => TaskState::Finished,
            Some(ExecutionStatus::Failed | ExecutionStatus::Cancelled) => TaskState::Failed,
        }
    }

    /// Whether the last run of `task` succeeded; drives the re-run prompt.
    pub fn last_succeeded(&self, task: &TaskId) -> bool {
        self.history.get(task) == Some(&ExecutionStatus::Finished)
    }
}
