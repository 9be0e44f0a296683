// src/exec/command.rs

//! Command construction: the executable, arguments and working directory a
//! project yields for a task, and how that becomes a `tokio::process::Command`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Fully resolved invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    /// Run `line` through the platform shell (`sh -c` / `cmd /C`).
    pub fn shell(line: &str, cwd: impl Into<PathBuf>) -> Self {
        if cfg!(windows) {
            Self::new("cmd", cwd).arg("/C").arg(line)
        } else {
            Self::new("sh", cwd).arg("-c").arg(line)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Human-readable command line for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Command for a supervised run: piped output, own process group so the
    /// whole tree can be signalled, killed if the handle is dropped.
    pub(crate) fn supervised(&self) -> Command {
        let mut cmd = self.base();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    /// Command for a fire-and-forget launch that shares our stdio.
    pub(crate) fn detached(&self) -> Command {
        let mut cmd = self.base();
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn base(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}
