// src/exec/launcher.rs

//! Fire-and-forget launches for viewers and command artifacts.
//!
//! These processes share our stdio, are never waited on by the caller and
//! are not tracked by any project's run state.

use anyhow::{Context, Result};
use tracing::info;

use crate::exec::CommandSpec;

pub trait DetachedLauncher: Send + Sync {
    /// Start `spec` and return its pid (if known) without waiting for it.
    fn launch(&self, spec: &CommandSpec) -> Result<Option<u32>>;
}

/// Spawns with inherited stdio. The child handle is dropped immediately;
/// Tokio reaps it in the background once it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealLauncher;

impl DetachedLauncher for RealLauncher {
    fn launch(&self, spec: &CommandSpec) -> Result<Option<u32>> {
        let child = spec.detached().spawn().with_context(|| {
            format!("launching `{}` in {}", spec.display(), spec.cwd().display())
        })?;
        let pid = child.id();
        info!(pid, cmd = %spec.display(), "launched detached process");
        Ok(pid)
    }
}
