// src/exec/process.rs

//! One spawned external process and the termination of its whole tree.
//!
//! On unix every supervised process is started as the leader of a fresh
//! process group, so the toolchain's shell wrapper and every tool it launches
//! share one group id. Cancelling signals the group rather than the leader:
//!
//! 1. SIGTERM to the group, then wait `grace` for the leader to exit.
//! 2. If it is still alive, SIGKILL to the group and wait `kill_timeout`.
//! 3. Once the leader is gone, any group member still alive is swept with
//!    SIGKILL.
//!
//! If the leader cannot be confirmed dead after step 2 the cancellation
//! fails with [`TerminationError::Unconfirmed`].
//!
//! On Windows the tree is killed with `taskkill /T /F` while the leader is
//! alive. Descendants that outlive their leader there are not swept.

use std::process::ExitStatus;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::exec::CommandSpec;

/// Timing used when cancelling a process tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub grace: Duration,
    pub kill_timeout: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(2),
        }
    }
}

/// How a cancelled process went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Needed SIGKILL.
    Forced,
    /// Had already exited before the request.
    AlreadyExited,
}

#[derive(Error, Debug)]
pub enum TerminationError {
    #[error("process {pid} still alive {waited:?} after SIGKILL")]
    Unconfirmed { pid: u32, waited: Duration },

    #[error("failed to signal process group {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

/// A running external process with its output pipes.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ProcessHandle {
    /// Spawn `spec` with piped output in its own process group.
    pub fn spawn(spec: &CommandSpec) -> anyhow::Result<Self> {
        let mut child = spec.supervised().spawn().with_context(|| {
            format!(
                "spawning `{}` in {}",
                spec.display(),
                spec.cwd().display()
            )
        })?;

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        debug!(pid, cmd = %spec.display(), "process spawned");

        Ok(Self {
            child,
            pid,
            stdout,
            stderr,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Wait for the leader to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the process and all of its descendants.
    pub async fn cancel(
        &mut self,
        policy: &TerminationPolicy,
    ) -> Result<Termination, TerminationError> {
        let Some(pid) = self.pid else {
            return Ok(Termination::AlreadyExited);
        };

        if let Ok(Some(_)) = self.child.try_wait() {
            sweep_group(pid, policy).await;
            return Ok(Termination::AlreadyExited);
        }

        self.terminate_tree(pid, policy).await
    }

    #[cfg(unix)]
    async fn terminate_tree(
        &mut self,
        pid: u32,
        policy: &TerminationPolicy,
    ) -> Result<Termination, TerminationError> {
        use nix::sys::signal::Signal;

        info!(pid, "sending SIGTERM to process group");
        signal_group(pid, Signal::SIGTERM)?;

        if timeout(policy.grace, self.child.wait()).await.is_ok() {
            sweep_group(pid, policy).await;
            return Ok(Termination::Graceful);
        }

        warn!(pid, grace = ?policy.grace, "process group ignored SIGTERM; sending SIGKILL");
        signal_group(pid, Signal::SIGKILL)?;

        match timeout(policy.kill_timeout, self.child.wait()).await {
            Ok(_) => {
                sweep_group(pid, policy).await;
                Ok(Termination::Forced)
            }
            Err(_) => Err(TerminationError::Unconfirmed {
                pid,
                waited: policy.kill_timeout,
            }),
        }
    }

    /// `taskkill /T /F` walks the leader's descendants; the leader is
    /// killed directly if that fails.
    #[cfg(not(unix))]
    async fn terminate_tree(
        &mut self,
        pid: u32,
        policy: &TerminationPolicy,
    ) -> Result<Termination, TerminationError> {
        use std::process::Stdio;

        info!(pid, "killing process tree");
        let taskkill = tokio::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match taskkill {
            Ok(status) if status.success() => {}
            other => {
                warn!(pid, result = ?other, "taskkill failed; killing the leader only");
                self.child
                    .start_kill()
                    .map_err(|e| TerminationError::Signal {
                        pid,
                        reason: e.to_string(),
                    })?;
            }
        }

        match timeout(policy.kill_timeout, self.child.wait()).await {
            Ok(_) => Ok(Termination::Forced),
            Err(_) => Err(TerminationError::Unconfirmed {
                pid,
                waited: policy.kill_timeout,
            }),
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), TerminationError> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        // The group is already empty.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(TerminationError::Signal {
            pid,
            reason: e.to_string(),
        }),
    }
}

/// Whether any member of the process group `pid` still exists.
#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    !matches!(
        killpg(Pid::from_raw(pid as i32), None::<Signal>),
        Err(Errno::ESRCH)
    )
}

/// Kill descendants that outlived the leader. Best effort: stragglers are
/// logged, the leader's death is what confirms the cancellation.
#[cfg(unix)]
async fn sweep_group(pid: u32, policy: &TerminationPolicy) {
    use nix::sys::signal::Signal;

    if !group_alive(pid) {
        return;
    }

    debug!(pid, "leader gone but group members remain; sending SIGKILL");
    if let Err(e) = signal_group(pid, Signal::SIGKILL) {
        warn!(pid, error = %e, "failed to sweep process group");
        return;
    }

    let poll = Duration::from_millis(20);
    let mut waited = Duration::ZERO;
    while group_alive(pid) && waited < policy.kill_timeout {
        tokio::time::sleep(poll).await;
        waited += poll;
    }

    if group_alive(pid) {
        warn!(pid, "process group members still present after SIGKILL (possibly unreaped zombies)");
    }
}

/// Without process groups, descendants whose leader already exited are no
/// longer reachable through the leader's pid.
#[cfg(not(unix))]
async fn sweep_group(pid: u32, _policy: &TerminationPolicy) {
    debug!(pid, "leader gone; orphaned descendants are not tracked on this platform");
}
