// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The coordinator talks to an `ExecutorBackend` instead of a concrete
//! [`TaskRunner`]. This makes it easy to swap in a fake executor in tests
//! while keeping the production process handling in [`task_runner`].
//!
//! - `RealExecutorBackend` is the implementation used by `hdlrun`; it spawns
//!   real processes through a `TaskRunner`.
//! - Tests can provide their own `ExecutorBackend` that records which runs
//!   were started and decides itself when (and how) each one completes.
//!
//! [`task_runner`]: crate::exec::task_runner

use std::sync::Arc;

use crate::exec::output::LogSink;
use crate::exec::task_runner::{ExecutionHandle, RunRequest, TaskRunner};

/// Trait abstracting how accepted runs are executed.
pub trait ExecutorBackend: Send + Sync {
    /// Start `request` and return its handle without waiting for it.
    ///
    /// The handle's completion channel must deliver exactly one result,
    /// including when the process could not be started. Called with the
    /// project registry locked: `sink` must not be used before returning.
    fn start(&self, request: RunRequest, sink: Arc<dyn LogSink>) -> ExecutionHandle;
}

/// Real executor backend used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealExecutorBackend {
    runner: TaskRunner,
}

impl RealExecutorBackend {
    pub fn new(runner: TaskRunner) -> Self {
        Self { runner }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn start(&self, request: RunRequest, sink: Arc<dyn LogSink>) -> ExecutionHandle {
        self.runner.run(request, sink)
    }
}
