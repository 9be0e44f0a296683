// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running toolchain commands, using
//! `tokio::process::Command`, and reporting back exactly one result per run.
//!
//! - [`command`] builds the invocation (program, args, cwd, env).
//! - [`process`] wraps one spawned process and terminates its whole tree.
//! - [`task_runner`] supervises a run: streams output, handles cancellation,
//!   delivers the completion.
//! - [`output`] holds the log sink contract and the per-line rewrite.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend`, which tests can replace with a fake.
//! - [`launcher`] starts untracked viewer / artifact commands.

pub mod backend;
pub mod command;
pub mod launcher;
pub mod output;
pub mod process;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use command::CommandSpec;
pub use launcher::{DetachedLauncher, RealLauncher};
pub use output::{LogSink, StdoutSink, rewrite_file_markers};
pub use process::{ProcessHandle, Termination, TerminationError, TerminationPolicy};
pub use task_runner::{
    ExecutionControl, ExecutionHandle, ExecutionResult, ExecutionStatus, RunRequest, TaskRunner,
};
