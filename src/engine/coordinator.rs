// src/engine/coordinator.rs

//! Multi-project coordinator.
//!
//! Holds every registered project with its [`ProjectRunState`], tracks the
//! selected project and routes run / stop / clean / console / artifact
//! operations to it. The coordinator is a plain value: clone it to share it,
//! there is no global instance.
//!
//! Locking: one `std::sync::Mutex` guards the registry. It is never held
//! across an `.await`; confirmations are awaited with the lock released and
//! the run state is re-checked when the lock is taken again.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactError, ArtifactResolver, ResolvedArtifact};
use crate::errors::{HdlrunError, Result};
use crate::exec::{
    CommandSpec, DetachedLauncher, ExecutionControl, ExecutionResult, ExecutionStatus,
    ExecutorBackend, LogSink, RealExecutorBackend, RealLauncher, RunRequest, StdoutSink,
};
use crate::fs::{FileSystem, RealFileSystem};
use crate::project::{ConsoleDefinition, Project};
use crate::state::{ProjectRunState, RunId, RunKind, RunPhase, TaskState};
use crate::types::{ProjectId, ReportKind, TaskId};

use super::dispatch::{DispatchTable, TaskHandler};
use super::notifier::TracingNotifier;
use super::prompt::{ConfirmRequest, Confirmer, TerminalConfirmer};
use super::{EngineEvent, MessageLevel, Notifier};

/// Message shown when a run or clean is refused because the project is busy.
pub const BUSY_MESSAGE: &str = "There is a task running. Please wait until it finishes.";

/// Result of a `run` / `clean` request.
#[derive(Debug)]
pub enum RunOutcome {
    /// Accepted; the process was handed to the executor.
    Started(RunTicket),
    /// Refused because the project already runs `running`.
    Rejected { running: RunKind },
    /// The user declined the confirmation.
    Declined,
    /// Handled by an untracked launch (viewer stages).
    Delegated { pid: Option<u32> },
    /// The untracked launch could not be started.
    LaunchFailed { reason: String },
}

impl RunOutcome {
    pub fn ticket(self) -> Option<RunTicket> {
        match self {
            RunOutcome::Started(ticket) => Some(ticket),
            _ => None,
        }
    }
}

/// Result of a `stop` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Termination of `kind`'s process tree was requested.
    Requested { kind: RunKind },
    /// A stop for `kind` is already in flight.
    AlreadyRequested { kind: RunKind },
    /// Nothing to stop.
    NotRunning,
}

/// Handle to an accepted tracked run.
#[derive(Debug)]
pub struct RunTicket {
    pub project: ProjectId,
    pub kind: RunKind,
    pub run_id: RunId,
    pub pid: Option<u32>,
    completion: oneshot::Receiver<ExecutionResult>,
}

impl RunTicket {
    /// Wait for the run's result. Resolves after the project's state has
    /// already left `Running`.
    pub async fn wait(self) -> ExecutionResult {
        match self.completion.await {
            Ok(result) => result,
            Err(_) => ExecutionResult::lost(self.project, self.kind),
        }
    }
}

struct ActiveRun {
    id: RunId,
    kind: RunKind,
    control: ExecutionControl,
}

struct ProjectSlot {
    project: Arc<Project>,
    state: ProjectRunState,
    active: Option<ActiveRun>,
}

#[derive(Default)]
struct Registry {
    projects: BTreeMap<ProjectId, ProjectSlot>,
    selected: Option<ProjectId>,
}

impl Registry {
    fn slot(&self, id: &ProjectId) -> Result<&ProjectSlot> {
        self.projects
            .get(id)
            .ok_or_else(|| HdlrunError::ProjectNotFound(id.to_string()))
    }

    fn slot_mut(&mut self, id: &ProjectId) -> Result<&mut ProjectSlot> {
        self.projects
            .get_mut(id)
            .ok_or_else(|| HdlrunError::ProjectNotFound(id.to_string()))
    }

    fn selected(&self) -> Result<ProjectId> {
        self.selected.clone().ok_or(HdlrunError::NoProjectSelected)
    }
}

struct Inner {
    registry: Mutex<Registry>,
    backend: Arc<dyn ExecutorBackend>,
    launcher: Arc<dyn DetachedLauncher>,
    resolver: ArtifactResolver,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    sink: Arc<dyn LogSink>,
    dispatch: DispatchTable,
}

/// Builder for [`MultiProjectCoordinator`]; every collaborator has a
/// production default.
pub struct CoordinatorBuilder {
    backend: Arc<dyn ExecutorBackend>,
    launcher: Arc<dyn DetachedLauncher>,
    fs: Arc<dyn FileSystem>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    sink: Arc<dyn LogSink>,
    dispatch: DispatchTable,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            backend: Arc::new(RealExecutorBackend::default()),
            launcher: Arc::new(RealLauncher),
            fs: Arc::new(RealFileSystem),
            notifier: Arc::new(TracingNotifier),
            confirmer: Arc::new(TerminalConfirmer),
            sink: Arc::new(StdoutSink),
            dispatch: DispatchTable::default(),
        }
    }
}

impl CoordinatorBuilder {
    pub fn backend(mut self, backend: Arc<dyn ExecutorBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn DetachedLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchTable) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn build(self) -> MultiProjectCoordinator {
        let resolver = ArtifactResolver::new(self.fs, Arc::clone(&self.launcher));
        MultiProjectCoordinator {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                backend: self.backend,
                launcher: self.launcher,
                resolver,
                notifier: self.notifier,
                confirmer: self.confirmer,
                sink: self.sink,
                dispatch: self.dispatch,
            }),
        }
    }
}

#[derive(Clone)]
pub struct MultiProjectCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MultiProjectCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry();
        f.debug_struct("MultiProjectCoordinator")
            .field("projects", &registry.projects.keys().collect::<Vec<_>>())
            .field("selected", &registry.selected)
            .finish_non_exhaustive()
    }
}

impl MultiProjectCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    /// Register `project` with a fresh `Idle` run state.
    ///
    /// Re-registering an id replaces the project only while it is not
    /// running. The first registered project becomes the selection.
    pub fn register(&self, project: Project) -> Result<()> {
        let id = project.id().clone();
        let mut registry = self.inner.registry();

        if let Some(existing) = registry.projects.get(&id) {
            if existing.state.is_running() {
                return Err(HdlrunError::ProjectBusy(id.to_string()));
            }
            debug!(project = %id, "replacing registered project");
        }

        registry.projects.insert(
            id.clone(),
            ProjectSlot {
                project: Arc::new(project),
                state: ProjectRunState::new(),
                active: None,
            },
        );
        if registry.selected.is_none() {
            registry.selected = Some(id.clone());
        }

        info!(project = %id, "project registered");
        Ok(())
    }

    pub fn select(&self, id: &ProjectId) -> Result<()> {
        let mut registry = self.inner.registry();
        registry.slot(id)?;
        registry.selected = Some(id.clone());
        info!(project = %id, "project selected");
        Ok(())
    }

    pub fn selected(&self) -> Option<ProjectId> {
        self.inner.registry().selected.clone()
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.inner.registry().projects.keys().cloned().collect()
    }

    pub fn project(&self, id: &ProjectId) -> Result<Arc<Project>> {
        Ok(Arc::clone(&self.inner.registry().slot(id)?.project))
    }

    /// Observed phase of a project. Terminal phases settle in the same step
    /// that records them, so this reads `Idle` or `Running`.
    pub fn phase(&self, id: &ProjectId) -> Result<RunPhase> {
        Ok(self.inner.registry().slot(id)?.state.phase())
    }

    /// State of `task` on the selected project.
    pub fn task_state(&self, task: &TaskId) -> Result<TaskState> {
        let project = self.inner.registry().selected()?;
        self.task_state_in(&project, task)
    }

    pub fn task_state_in(&self, project: &ProjectId, task: &TaskId) -> Result<TaskState> {
        let registry = self.inner.registry();
        let slot = registry.slot(project)?;
        if slot.project.task(task).is_none() {
            return Err(HdlrunError::TaskNotFound(task.to_string()));
        }
        Ok(slot.state.task_state(task))
    }

    // ---------------------------------------------------------------------
    // Run / clean
    // ---------------------------------------------------------------------

    /// Run `task` on the selected project.
    pub async fn run(&self, task: &TaskId) -> Result<RunOutcome> {
        let project = self.inner.registry().selected()?;
        self.run_in(&project, task).await
    }

    /// Run `task` on `project_id`.
    ///
    /// - Viewer-like stages are launched untracked and never touch the run
    ///   state.
    /// - A busy project rejects the request without spawning anything.
    /// - A task whose last run succeeded asks for confirmation first.
    pub async fn run_in(&self, project_id: &ProjectId, task: &TaskId) -> Result<RunOutcome> {
        let (project, handler, busy_with, rerun) = {
            let registry = self.inner.registry();
            let slot = registry.slot(project_id)?;
            let def = slot
                .project
                .task(task)
                .ok_or_else(|| HdlrunError::TaskNotFound(task.to_string()))?;
            (
                Arc::clone(&slot.project),
                self.inner.dispatch.handler_for(def.stage),
                slot.state.is_running().then(|| slot.state.current().cloned()).flatten(),
                slot.state.last_succeeded(task),
            )
        };

        let command = project
            .command_for(task)
            .ok_or_else(|| HdlrunError::TaskNotFound(task.to_string()))?;

        if handler == TaskHandler::Detached {
            return Ok(self.launch_detached(project_id, task, &command));
        }

        if let Some(running) = busy_with {
            return Ok(self.reject(project_id, running));
        }

        if rerun {
            let request = ConfirmRequest::Rerun {
                project: project_id.clone(),
                task: task.clone(),
            };
            if !self.inner.confirmer.confirm(&request).await {
                info!(project = %project_id, task = %task, "re-run declined");
                return Ok(RunOutcome::Declined);
            }
        }

        self.start_tracked(project_id, RunKind::Task(task.clone()), command)
    }

    /// Clean the selected project.
    pub async fn clean(&self) -> Result<RunOutcome> {
        let project = self.inner.registry().selected()?;
        self.clean_in(&project).await
    }

    /// Remove everything the toolchain generated for `project_id`. Runs like
    /// a task: single-flight, streamed, tracked.
    pub async fn clean_in(&self, project_id: &ProjectId) -> Result<RunOutcome> {
        let (project, busy_with) = {
            let registry = self.inner.registry();
            let slot = registry.slot(project_id)?;
            (
                Arc::clone(&slot.project),
                slot.state.is_running().then(|| slot.state.current().cloned()).flatten(),
            )
        };

        if let Some(running) = busy_with {
            return Ok(self.reject(project_id, running));
        }

        let request = ConfirmRequest::Clean {
            project: project_id.clone(),
        };
        if !self.inner.confirmer.confirm(&request).await {
            info!(project = %project_id, "clean declined");
            return Ok(RunOutcome::Declined);
        }

        self.start_tracked(project_id, RunKind::Clean, project.clean_command())
    }

    fn launch_detached(&self, project: &ProjectId, task: &TaskId, command: &CommandSpec) -> RunOutcome {
        match self.inner.launcher.launch(command) {
            Ok(pid) => {
                info!(project = %project, task = %task, ?pid, "task delegated to detached launch");
                RunOutcome::Delegated { pid }
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(project = %project, task = %task, error = %reason, "detached launch failed");
                self.message(
                    Some(project),
                    MessageLevel::Warning,
                    format!("Failed to start {task}: {reason}"),
                );
                RunOutcome::LaunchFailed { reason }
            }
        }
    }

    fn reject(&self, project: &ProjectId, running: RunKind) -> RunOutcome {
        info!(project = %project, running = %running, "request rejected; project busy");
        self.message(Some(project), MessageLevel::Info, BUSY_MESSAGE.to_string());
        RunOutcome::Rejected { running }
    }

    /// `Idle -> Running`, hand the command to the backend and watch for its
    /// completion.
    fn start_tracked(
        &self,
        project_id: &ProjectId,
        kind: RunKind,
        command: CommandSpec,
    ) -> Result<RunOutcome> {
        let (run_id, pid, completion) = {
            let mut registry = self.inner.registry();
            let slot = registry.slot_mut(project_id)?;

            // Re-checked here: another request may have won while a
            // confirmation was pending.
            let run_id = match slot.state.begin(kind.clone()) {
                Ok(id) => id,
                Err(rejected) => {
                    drop(registry);
                    return Ok(self.reject(project_id, rejected.running));
                }
            };

            let request = RunRequest {
                project: project_id.clone(),
                kind: kind.clone(),
                command,
            };
            let handle = self
                .inner
                .backend
                .start(request, Arc::clone(&self.inner.sink));
            let pid = handle.pid();
            let (control, completion) = handle.into_parts();

            slot.active = Some(ActiveRun {
                id: run_id,
                kind: kind.clone(),
                control,
            });
            (run_id, pid, completion)
        };

        self.inner.sink.reveal();
        self.inner.notifier.notify(EngineEvent::RunStarted {
            project: project_id.clone(),
            kind: kind.clone(),
            run_id,
            pid,
        });
        self.inner.notifier.notify(EngineEvent::StateRefresh {
            project: project_id.clone(),
        });

        let (ticket_tx, ticket_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let watched_project = project_id.clone();
        let watched_kind = kind.clone();
        tokio::spawn(async move {
            let result = match completion.await {
                Ok(result) => result,
                Err(_) => {
                    warn!(project = %watched_project, task = %watched_kind, "executor dropped the completion channel");
                    ExecutionResult::lost(watched_project.clone(), watched_kind)
                }
            };
            inner.finish(&watched_project, run_id, &result);
            let _ = ticket_tx.send(result);
        });

        Ok(RunOutcome::Started(RunTicket {
            project: project_id.clone(),
            kind,
            run_id,
            pid,
            completion: ticket_rx,
        }))
    }

    // ---------------------------------------------------------------------
    // Stop
    // ---------------------------------------------------------------------

    /// Stop the selected project's active run.
    pub fn stop(&self) -> Result<StopOutcome> {
        let project = self.inner.registry().selected()?;
        self.stop_in(&project)
    }

    /// Request termination of `project_id`'s process tree. Returns at once;
    /// the run's completion reports the outcome. A project with nothing
    /// running is left alone.
    pub fn stop_in(&self, project_id: &ProjectId) -> Result<StopOutcome> {
        let mut registry = self.inner.registry();
        let slot = registry.slot_mut(project_id)?;

        let Some(active) = slot.active.as_mut() else {
            return Ok(StopOutcome::NotRunning);
        };

        let kind = active.kind.clone();
        if active.control.cancel() {
            info!(project = %project_id, task = %kind, run_id = active.id.get(), pid = ?active.control.pid(), "stop requested");
            Ok(StopOutcome::Requested { kind })
        } else {
            debug!(project = %project_id, task = %kind, "stop already requested or run ending");
            Ok(StopOutcome::AlreadyRequested { kind })
        }
    }

    // ---------------------------------------------------------------------
    // Console / artifacts
    // ---------------------------------------------------------------------

    /// Console definition of the selected project for `shell`.
    pub fn open_console(&self, shell: &str) -> Result<ConsoleDefinition> {
        let project = self.inner.registry().selected()?;
        self.open_console_in(&project, shell)
    }

    pub fn open_console_in(&self, project_id: &ProjectId, shell: &str) -> Result<ConsoleDefinition> {
        let project = self.project(project_id)?;
        project
            .console(shell)
            .ok_or_else(|| HdlrunError::ConsoleNotFound(shell.to_string()))
    }

    /// Resolve `report` for `task` on the selected project.
    pub fn get_artifact(
        &self,
        task: &TaskId,
        report: ReportKind,
    ) -> Result<std::result::Result<ResolvedArtifact, ArtifactError>> {
        let project = self.inner.registry().selected()?;
        self.get_artifact_in(&project, task, report)
    }

    /// Resolve `report` for `task` on `project_id`.
    ///
    /// The outer `Result` covers unknown projects; the inner one is the
    /// artifact outcome, already surfaced as a warning message when it is an
    /// error. Run state is never touched.
    pub fn get_artifact_in(
        &self,
        project_id: &ProjectId,
        task: &TaskId,
        report: ReportKind,
    ) -> Result<std::result::Result<ResolvedArtifact, ArtifactError>> {
        if !report.is_supported() {
            let err = ArtifactError::Unsupported { report };
            self.message(Some(project_id), MessageLevel::Warning, err.to_string());
            return Ok(Err(err));
        }

        let project = self.project(project_id)?;
        let outcome = self.inner.resolver.resolve(&project, task, report);

        match &outcome {
            Ok(_) => self.inner.notifier.notify(EngineEvent::ArtifactReady {
                project: project_id.clone(),
                task: task.clone(),
                report,
            }),
            Err(e) => self.message(Some(project_id), MessageLevel::Warning, e.to_string()),
        }

        Ok(outcome)
    }

    fn message(&self, project: Option<&ProjectId>, level: MessageLevel, text: String) {
        self.inner.notifier.notify(EngineEvent::Message {
            project: project.cloned(),
            level,
            text,
        });
    }
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a completion: `Running -> Finished|Failed -> Idle` in one step,
    /// then emit the events. Completions for runs that are no longer active
    /// are dropped.
    fn finish(&self, project_id: &ProjectId, run_id: RunId, result: &ExecutionResult) {
        let (kind, phase) = {
            let mut registry = self.registry();
            let Some(slot) = registry.projects.get_mut(project_id) else {
                warn!(project = %project_id, "completion for an unregistered project");
                return;
            };

            let Some(phase) = slot.state.complete(run_id, result.status) else {
                return;
            };

            let kind = match slot.active.take() {
                Some(active) if active.id == run_id => active.kind,
                other => {
                    slot.active = other;
                    result.kind.clone()
                }
            };
            slot.state.settle();
            (kind, phase)
        };

        info!(
            project = %project_id,
            task = %kind,
            run_id = run_id.get(),
            status = ?result.status,
            exit_code = ?result.exit_code,
            duration = ?result.duration,
            "run completed"
        );

        self.notifier.notify(EngineEvent::RunFinished {
            project: project_id.clone(),
            kind: kind.clone(),
            run_id,
            status: result.status,
            phase,
        });

        if result.status == ExecutionStatus::Cancelled {
            self.notifier.notify(EngineEvent::TaskStopped {
                project: project_id.clone(),
                kind: kind.clone(),
            });
            self.notifier.notify(EngineEvent::Message {
                project: Some(project_id.clone()),
                level: MessageLevel::Info,
                text: format!("{kind} stopped successfully."),
            });
        }

        if !result.termination_confirmed {
            self.notifier.notify(EngineEvent::Message {
                project: Some(project_id.clone()),
                level: MessageLevel::Warning,
                text: format!(
                    "Could not confirm that {kind} terminated; the project state may be inconsistent."
                ),
            });
        }

        self.notifier.notify(EngineEvent::StateRefresh {
            project: project_id.clone(),
        });
    }
}
