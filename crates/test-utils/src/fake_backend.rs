use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use hdlrun::exec::{
    ExecutionHandle, ExecutionResult, ExecutionStatus, ExecutorBackend, LogSink, RunRequest,
};
use hdlrun::types::ProjectId;
use tokio::sync::oneshot;

/// How a fake run ends when the test completes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeCompletion {
    Success,
    Failure(i32),
}

#[derive(Default)]
struct FakeState {
    started: Vec<RunRequest>,
    pending: Vec<(ProjectId, oneshot::Sender<FakeCompletion>)>,
    output: Vec<String>,
    auto_complete: Option<FakeCompletion>,
    fail_spawn: bool,
    unconfirmed_cancel: bool,
}

/// A fake executor backend that:
/// - records every started run
/// - writes canned output lines to the sink once started
/// - completes a run only when the test says so (or immediately, with
///   `with_auto_complete`)
/// - answers a cancellation with a `Cancelled` result.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    cancels: Arc<AtomicUsize>,
    next_pid: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            next_pid: Arc::new(AtomicUsize::new(1000)),
            ..Self::default()
        }
    }

    pub fn with_output(self, lines: &[&str]) -> Self {
        self.state.lock().unwrap().output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_auto_complete(self, completion: FakeCompletion) -> Self {
        self.state.lock().unwrap().auto_complete = Some(completion);
        self
    }

    /// Every start behaves like a process that could not be spawned.
    pub fn with_spawn_failure(self) -> Self {
        self.state.lock().unwrap().fail_spawn = true;
        self
    }

    /// Cancellations end as `Failed` with `termination_confirmed = false`.
    pub fn with_unconfirmed_cancel(self) -> Self {
        self.state.lock().unwrap().unconfirmed_cancel = true;
        self
    }

    pub fn started(&self) -> Vec<RunRequest> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().unwrap().started.len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Complete the oldest pending run of `project`. Returns `false` if the
    /// project has none.
    pub fn complete(&self, project: &ProjectId, completion: FakeCompletion) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.pending.iter().position(|(p, _)| p == project) else {
            return false;
        };
        let (_, tx) = state.pending.remove(idx);
        tx.send(completion).is_ok()
    }
}

fn result_for(
    request: &RunRequest,
    status: ExecutionStatus,
    exit_code: Option<i32>,
    confirmed: bool,
) -> ExecutionResult {
    ExecutionResult {
        project: request.project.clone(),
        kind: request.kind.clone(),
        status,
        exit_code,
        started_at: SystemTime::now(),
        duration: Duration::from_millis(1),
        termination_confirmed: confirmed,
        error: None,
    }
}

impl ExecutorBackend for FakeBackend {
    fn start(&self, request: RunRequest, sink: Arc<dyn LogSink>) -> ExecutionHandle {
        let (done_tx, done_rx) = oneshot::channel();

        let (output, auto_complete, fail_spawn, unconfirmed_cancel) = {
            let mut state = self.state.lock().unwrap();
            state.started.push(request.clone());
            (
                state.output.clone(),
                state.auto_complete,
                state.fail_spawn,
                state.unconfirmed_cancel,
            )
        };

        // Like the real runner, the sink is only written from the runtime.
        if fail_spawn {
            tokio::spawn(async move {
                sink.append(&format!("[{}] failed to start: fake spawn failure", request.kind));
                let _ = done_tx.send(ExecutionResult::spawn_failed(
                    request.project,
                    request.kind,
                    "fake spawn failure".to_string(),
                ));
            });
            return ExecutionHandle::new(None, None, done_rx);
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) as u32;
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let (complete_tx, mut complete_rx) = oneshot::channel::<FakeCompletion>();

        match auto_complete {
            Some(completion) => {
                let _ = complete_tx.send(completion);
            }
            None => self
                .state
                .lock()
                .unwrap()
                .pending
                .push((request.project.clone(), complete_tx)),
        }

        let cancels = Arc::clone(&self.cancels);
        tokio::spawn(async move {
            for line in &output {
                sink.append(line);
            }

            let finished = |completion: FakeCompletion| match completion {
                FakeCompletion::Success => {
                    result_for(&request, ExecutionStatus::Finished, Some(0), true)
                }
                FakeCompletion::Failure(code) => {
                    result_for(&request, ExecutionStatus::Failed, Some(code), true)
                }
            };

            let result = tokio::select! {
                biased;
                completion = &mut complete_rx => completion.ok().map(&finished),
                cancel = &mut cancel_rx => match cancel {
                    Ok(()) => {
                        cancels.fetch_add(1, Ordering::SeqCst);
                        Some(if unconfirmed_cancel {
                            result_for(&request, ExecutionStatus::Failed, None, false)
                        } else {
                            result_for(&request, ExecutionStatus::Cancelled, None, true)
                        })
                    }
                    Err(_) => complete_rx.await.ok().map(&finished),
                },
            };

            if let Some(result) = result {
                let _ = done_tx.send(result);
            }
        });

        ExecutionHandle::new(Some(pid), Some(cancel_tx), done_rx)
    }
}
