// src/exec/task_runner.rs

//! Individual task process runner.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::exec::output::{LogSink, OutputStream, for_each_line, rewrite_file_markers};
use crate::exec::process::{ProcessHandle, TerminationPolicy};
use crate::exec::CommandSpec;
use crate::state::RunKind;
use crate::types::ProjectId;

/// Final status of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Finished,
    Failed,
    Cancelled,
}

/// What the runner reports, exactly once, when an execution ends.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub project: ProjectId,
    pub kind: RunKind,
    pub status: ExecutionStatus,
    /// Exit code when the process exited on its own.
    pub exit_code: Option<i32>,
    pub started_at: SystemTime,
    pub duration: Duration,
    /// `false` when a cancellation could not confirm the process died; the
    /// project's state may then be inconsistent with the OS.
    pub termination_confirmed: bool,
    /// Spawn / wait / termination error, if any.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A failed result for an execution that never got a process.
    pub fn spawn_failed(project: ProjectId, kind: RunKind, error: String) -> Self {
        Self {
            project,
            kind,
            status: ExecutionStatus::Failed,
            exit_code: None,
            started_at: SystemTime::now(),
            duration: Duration::ZERO,
            termination_confirmed: true,
            error: Some(error),
        }
    }

    /// A failed result for an execution whose supervisor vanished without
    /// reporting. Whether the process is gone is unknown.
    pub fn lost(project: ProjectId, kind: RunKind) -> Self {
        Self {
            project,
            kind,
            status: ExecutionStatus::Failed,
            exit_code: None,
            started_at: SystemTime::now(),
            duration: Duration::ZERO,
            termination_confirmed: false,
            error: Some("execution ended without reporting a result".to_string()),
        }
    }
}

/// Caller side of a started execution: pid, cancellation and the completion
/// channel.
#[derive(Debug)]
pub struct ExecutionHandle {
    control: ExecutionControl,
    completion: oneshot::Receiver<ExecutionResult>,
}

impl ExecutionHandle {
    pub fn new(
        pid: Option<u32>,
        cancel: Option<oneshot::Sender<()>>,
        completion: oneshot::Receiver<ExecutionResult>,
    ) -> Self {
        Self {
            control: ExecutionControl { pid, cancel },
            completion,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.control.pid
    }

    /// Split into the cancel side and the completion receiver.
    pub fn into_parts(self) -> (ExecutionControl, oneshot::Receiver<ExecutionResult>) {
        (self.control, self.completion)
    }
}

/// Cancellation side of a started execution.
#[derive(Debug)]
pub struct ExecutionControl {
    pid: Option<u32>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ExecutionControl {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request termination of the process tree.
    ///
    /// Returns `false` if a request was already made or the execution has
    /// already ended. Never blocks.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// A run as the executor sees it.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project: ProjectId,
    pub kind: RunKind,
    pub command: CommandSpec,
}

/// Live execution, owned by its supervising Tokio task.
struct TaskExecution {
    request: RunRequest,
    process: ProcessHandle,
    started_at: SystemTime,
    clock: Instant,
}

/// Spawns toolchain processes and supervises them until they end.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    policy: TerminationPolicy,
    drain_timeout: Duration,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(TerminationPolicy::default(), Duration::from_secs(2))
    }
}

impl TaskRunner {
    pub fn new(policy: TerminationPolicy, drain_timeout: Duration) -> Self {
        Self {
            policy,
            drain_timeout,
        }
    }

    /// Spawn the process for `request` and return immediately.
    ///
    /// - Output lines go to `sink` as they arrive, with `File: ` markers
    ///   rewritten.
    /// - The completion receiver yields exactly one [`ExecutionResult`].
    /// - A spawn failure never escapes: the handle comes back without a pid
    ///   and its completion resolves to a `Failed` result once the failure
    ///   line has reached the sink.
    /// - `sink` is never called before this returns.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, request: RunRequest, sink: Arc<dyn LogSink>) -> ExecutionHandle {
        let (done_tx, done_rx) = oneshot::channel();

        info!(
            project = %request.project,
            task = %request.kind,
            cmd = %request.command.display(),
            "starting task process"
        );

        let process = match ProcessHandle::spawn(&request.command) {
            Ok(p) => p,
            Err(err) => {
                error!(
                    project = %request.project,
                    task = %request.kind,
                    error = %format!("{err:#}"),
                    "failed to start task process"
                );
                // Callers may hold their own locks across `run`; the sink only
                // ever sees this line from the runtime.
                tokio::spawn(async move {
                    sink.append(&format!("[{}] failed to start: {err:#}", request.kind));
                    let result = ExecutionResult::spawn_failed(
                        request.project,
                        request.kind,
                        format!("{err:#}"),
                    );
                    if done_tx.send(result).is_err() {
                        debug!("completion receiver dropped before the spawn failure was delivered");
                    }
                });
                return ExecutionHandle::new(None, None, done_rx);
            }
        };

        let pid = process.pid();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let execution = TaskExecution {
            request,
            process,
            started_at: SystemTime::now(),
            clock: Instant::now(),
        };

        let runner = *self;
        tokio::spawn(async move {
            let result = runner.supervise(execution, sink, cancel_rx).await;
            if done_tx.send(result).is_err() {
                debug!("completion receiver dropped before the result was delivered");
            }
        });

        ExecutionHandle::new(pid, Some(cancel_tx), done_rx)
    }

    async fn supervise(
        &self,
        mut execution: TaskExecution,
        sink: Arc<dyn LogSink>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> ExecutionResult {
        let mut readers = Vec::new();
        if let Some(stdout) = execution.process.take_stdout() {
            readers.push(forward_output(stdout, OutputStream::Stdout, Arc::clone(&sink)));
        }
        if let Some(stderr) = execution.process.take_stderr() {
            readers.push(forward_output(stderr, OutputStream::Stderr, Arc::clone(&sink)));
        }

        let project = execution.request.project.clone();
        let kind = execution.request.kind.clone();
        let mut cancel_open = true;

        // Either the process exits on its own, or a cancellation arrives and
        // the whole tree is terminated.
        let mut outcome = loop {
            tokio::select! {
                status_res = execution.process.wait() => {
                    break match status_res {
                        Ok(status) => {
                            let code = status.code();
                            info!(
                                project = %project,
                                task = %kind,
                                exit_code = ?code,
                                success = status.success(),
                                "task process exited"
                            );
                            let s = if status.success() {
                                ExecutionStatus::Finished
                            } else {
                                ExecutionStatus::Failed
                            };
                            (s, code, true, None)
                        }
                        Err(e) => {
                            error!(project = %project, task = %kind, error = %e, "waiting for task process failed");
                            (ExecutionStatus::Failed, None, true, Some(e.to_string()))
                        }
                    };
                }

                cancel = &mut cancel_rx, if cancel_open => {
                    match cancel {
                        Ok(()) => {
                            cancel_open = false;
                            info!(
                                project = %project,
                                task = %kind,
                                pid = ?execution.process.pid(),
                                "cancellation requested; terminating process tree"
                            );
                            break match execution.process.cancel(&self.policy).await {
                                Ok(how) => {
                                    info!(project = %project, task = %kind, termination = ?how, "task process terminated");
                                    (ExecutionStatus::Cancelled, None, true, None)
                                }
                                Err(e) => {
                                    warn!(
                                        project = %project,
                                        task = %kind,
                                        error = %e,
                                        "could not confirm task process termination; state may be inconsistent"
                                    );
                                    (ExecutionStatus::Failed, None, false, Some(e.to_string()))
                                }
                            };
                        }
                        Err(_) => {
                            // Control dropped without cancelling; keep supervising.
                            debug!(project = %project, task = %kind, "cancel channel closed without cancellation");
                            cancel_open = false;
                        }
                    }
                }
            }
        };

        // The leader is gone but descendants may still hold the pipes; a
        // cancellation arriving now sweeps what is left of the tree.
        {
            let drain = self.drain(readers, &project, &kind);
            tokio::pin!(drain);
            loop {
                tokio::select! {
                    _ = &mut drain => break,

                    cancel = &mut cancel_rx, if cancel_open => {
                        cancel_open = false;
                        if cancel.is_err() {
                            continue;
                        }
                        info!(
                            project = %project,
                            task = %kind,
                            pid = ?execution.process.pid(),
                            "cancellation requested after exit; terminating remaining process tree"
                        );
                        outcome = match execution.process.cancel(&self.policy).await {
                            Ok(how) => {
                                info!(project = %project, task = %kind, termination = ?how, "remaining processes terminated");
                                (ExecutionStatus::Cancelled, None, true, None)
                            }
                            Err(e) => {
                                warn!(
                                    project = %project,
                                    task = %kind,
                                    error = %e,
                                    "could not confirm termination of remaining processes; state may be inconsistent"
                                );
                                (ExecutionStatus::Failed, None, false, Some(e.to_string()))
                            }
                        };
                    }
                }
            }
        }

        let (status, exit_code, termination_confirmed, error) = outcome;
        ExecutionResult {
            project,
            kind,
            status,
            exit_code,
            started_at: execution.started_at,
            duration: execution.clock.elapsed(),
            termination_confirmed,
            error,
        }
    }

    /// Give the output readers a bounded chance to reach EOF so the result
    /// normally follows the last line. Readers still open afterwards keep
    /// forwarding in the background.
    async fn drain(&self, readers: Vec<JoinHandle<()>>, project: &ProjectId, kind: &RunKind) {
        let all = async {
            for reader in readers {
                let _ = reader.await;
            }
        };

        if timeout(self.drain_timeout, all).await.is_err() {
            warn!(
                project = %project,
                task = %kind,
                drain_timeout = ?self.drain_timeout,
                "output still open after process exit; remaining lines will follow the result"
            );
        }
    }
}

fn forward_output<R>(reader: R, stream: OutputStream, sink: Arc<dyn LogSink>) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        for_each_line(reader, stream, |line| sink.append(&rewrite_file_markers(line))).await;
        debug!(stream = stream.as_str(), "output stream ended");
    })
}
