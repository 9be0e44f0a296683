// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::types::{ArtifactKind, ContentKind, Stage};

/// Top-level configuration exactly as read from a TOML file.
///
/// ```toml
/// [config]
/// selected = "blinky"
/// terminate_grace = "5s"
///
/// [project.blinky]
/// root = "hw/blinky"
///
/// [project.blinky.task.Synthesize]
/// stage = "synthesize"
/// cmd = "quartus_syn {project}"
///
/// [project.blinky.task.Synthesize.report.report]
/// kind = "summary"
/// content = "text_file"
/// path = "{build_dir}/blinky.syn.rpt"
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All projects from `[project.<name>]`.
    #[serde(default)]
    pub project: BTreeMap<String, ProjectConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means
/// durations parse, templates only use known placeholders and every task
/// has exactly one way of building its command.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub project: BTreeMap<String, ProjectConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        project: BTreeMap<String, ProjectConfig>,
    ) -> Self {
        Self { config, project }
    }

    /// Name of the project that starts out selected.
    pub fn initial_selection(&self) -> Option<&str> {
        self.config
            .selected
            .as_deref()
            .or_else(|| self.project.keys().next().map(String::as_str))
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Project selected at startup; defaults to the first project by name.
    #[serde(default)]
    pub selected: Option<String>,

    /// How long a cancelled process group gets after SIGTERM before SIGKILL.
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace: String,

    /// How long to wait for death to be confirmed after SIGKILL.
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout: String,

    /// How long to wait for stdout/stderr EOF after the process exited.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,
}

fn default_terminate_grace() -> String {
    "5s".to_string()
}

fn default_kill_timeout() -> String {
    "2s".to_string()
}

fn default_drain_timeout() -> String {
    "2s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            selected: None,
            terminate_grace: default_terminate_grace(),
            kill_timeout: default_kill_timeout(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl ConfigSection {
    pub fn terminate_grace(&self) -> Duration {
        parse_duration(&self.terminate_grace).unwrap_or(Duration::from_secs(5))
    }

    pub fn kill_timeout(&self) -> Duration {
        parse_duration(&self.kill_timeout).unwrap_or(Duration::from_secs(2))
    }

    pub fn drain_timeout(&self) -> Duration {
        parse_duration(&self.drain_timeout).unwrap_or(Duration::from_secs(2))
    }
}

/// `[project.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// Project root, relative to the directory holding the config file.
    #[serde(default)]
    pub root: Option<String>,

    /// Directory (relative to `root`) holding everything the toolchain
    /// generates. Removed by the default clean command.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Shell command that removes generated state. When absent the build
    /// directory is removed.
    #[serde(default)]
    pub clean: Option<String>,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Console definitions keyed by shell kind (`bash`, `powershell`, ...).
    #[serde(default)]
    pub terminal: BTreeMap<String, TerminalConfig>,
}

fn default_build_dir() -> String {
    "build".to_string()
}

/// `[project.<name>.task.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    #[serde(default)]
    pub stage: Stage,

    /// Shell command line, run through `sh -c` (or `cmd /C`).
    #[serde(default)]
    pub cmd: Option<String>,

    /// Executable invoked directly with `args`. Mutually exclusive with `cmd`.
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; defaults to the project root.
    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Artifacts keyed by report kind (`report`, `timing-analyzer`, ...).
    #[serde(default)]
    pub report: BTreeMap<String, ReportConfig>,
}

/// `[project.<name>.task.<id>.report.<kind>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub name: Option<String>,

    pub kind: ArtifactKind,

    pub content: ContentKind,

    #[serde(default)]
    pub path: Option<String>,

    /// Command line for `kind = "command"` artifacts.
    #[serde(default)]
    pub command: Option<String>,

    /// Inline markup for `content = "html"` summaries.
    #[serde(default)]
    pub inline: Option<String>,
}

/// `[project.<name>.terminal.<shell>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub name: Option<String>,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Text sent to the terminal once it is open (e.g. sourcing an env script).
    #[serde(default)]
    pub post_command: Option<String>,
}
