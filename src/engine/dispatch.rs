// src/engine/dispatch.rs

//! Stage -> handler table consulted before a task reaches the run state.

use std::collections::HashMap;

use crate::types::Stage;

/// How a task of a given stage is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHandler {
    /// Single-flight run through the executor backend, with state tracking.
    Tracked,
    /// Untracked launch (viewers); never touches the run state.
    Detached,
}

#[derive(Debug, Clone)]
pub struct DispatchTable {
    overrides: HashMap<Stage, TaskHandler>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self {
            overrides: HashMap::from([(Stage::Viewer, TaskHandler::Detached)]),
        }
    }
}

impl DispatchTable {
    pub fn with(mut self, stage: Stage, handler: TaskHandler) -> Self {
        self.overrides.insert(stage, handler);
        self
    }

    pub fn handler_for(&self, stage: Stage) -> TaskHandler {
        self.overrides
            .get(&stage)
            .copied()
            .unwrap_or(TaskHandler::Tracked)
    }
}

