// src/state/mod.rs

//! Run state tracking.
//!
//! - [`run_state`] holds the per-project single-flight state machine
//!   (`Idle -> Running -> Finished|Failed -> Idle`) plus the per-task history
//!   used for task decorations and the re-run confirmation.

pub mod run_state;

pub use run_state::{ProjectRunState, Rejected, RunId, RunKind, RunPhase, TaskState};
