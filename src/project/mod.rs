// src/project/mod.rs

//! The `Project` abstraction consumed by the engine.
//!
//! A project answers three questions for the core:
//! - which tasks exist and what stage each represents ([`TaskDefinition`]),
//! - how to invoke a task or the clean step ([`CommandSpec`]),
//! - which artifact backs a (task, report kind) pair and which consoles it
//!   offers.
//!
//! Projects are built once from a validated [`ConfigFile`] and are immutable
//! afterwards.

pub mod template;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::artifacts::Artifact;
use crate::config::model::{ConfigFile, ProjectConfig, ReportConfig, TaskConfig, TerminalConfig};
use crate::exec::CommandSpec;
use crate::types::{ProjectId, ReportKind, Stage, TaskId};

use template::TemplateVars;

/// How a task's command line is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTemplate {
    /// Passed to the platform shell.
    Shell(String),
    /// Executed directly.
    Direct { program: String, args: Vec<String> },
}

/// Static description of one task of a project.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub id: TaskId,
    pub stage: Stage,
    pub command: CommandTemplate,
    pub cwd: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl TaskDefinition {
    fn from_config(id: TaskId, cfg: &TaskConfig) -> Self {
        let command = match (&cfg.cmd, &cfg.program) {
            (Some(cmd), _) => CommandTemplate::Shell(cmd.clone()),
            (None, Some(program)) => CommandTemplate::Direct {
                program: program.clone(),
                args: cfg.args.clone(),
            },
            // Excluded by validation; an empty shell line fails loudly at spawn.
            (None, None) => CommandTemplate::Shell(String::new()),
        };

        Self {
            id,
            stage: cfg.stage,
            command,
            cwd: cfg.cwd.clone(),
            env: cfg.env.clone(),
        }
    }
}

/// What the presentation layer needs to open a console for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleDefinition {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub post_command: Option<String>,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Project {
    id: ProjectId,
    root: PathBuf,
    build_dir: PathBuf,
    clean: Option<String>,
    tasks: BTreeMap<TaskId, TaskDefinition>,
    reports: BTreeMap<(TaskId, ReportKind), ReportConfig>,
    terminals: BTreeMap<String, TerminalConfig>,
}

impl Project {
    /// Build a project from its `[project.<id>]` section; relative roots are
    /// resolved against `base_dir`.
    pub fn from_config(id: ProjectId, cfg: &ProjectConfig, base_dir: &Path) -> Self {
        let root_vars = TemplateVars::new(id.as_str(), &base_dir.display().to_string(), "");
        let root = match &cfg.root {
            Some(r) => base_dir.join(root_vars.render(r)),
            None => base_dir.to_path_buf(),
        };

        let dir_vars = TemplateVars::new(id.as_str(), &root.display().to_string(), "");
        let build_dir = root.join(dir_vars.render(&cfg.build_dir));

        let mut tasks = BTreeMap::new();
        let mut reports = BTreeMap::new();
        for (name, task_cfg) in cfg.task.iter() {
            let task_id = TaskId::new(name.clone());
            for (kind, report) in task_cfg.report.iter() {
                // Unparsable kinds were rejected by validation.
                if let Ok(kind) = kind.parse::<ReportKind>() {
                    reports.insert((task_id.clone(), kind), report.clone());
                }
            }
            tasks.insert(task_id.clone(), TaskDefinition::from_config(task_id, task_cfg));
        }

        Self {
            id,
            root,
            build_dir,
            clean: cfg.clean.clone(),
            tasks,
            reports,
            terminals: cfg.terminal.clone(),
        }
    }

    /// Every project of a validated config file, in name order.
    pub fn all_from_config(cfg: &ConfigFile, base_dir: &Path) -> Vec<Project> {
        cfg.project
            .iter()
            .map(|(name, pc)| Project::from_config(ProjectId::new(name.clone()), pc, base_dir))
            .collect()
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskDefinition> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    pub fn shells(&self) -> impl Iterator<Item = &str> {
        self.terminals.keys().map(String::as_str)
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new(
            self.id.as_str(),
            &self.root.display().to_string(),
            &self.build_dir.display().to_string(),
        )
    }

    fn resolve_dir(&self, rendered: &str) -> PathBuf {
        let p = PathBuf::from(rendered);
        if p.is_absolute() { p } else { self.root.join(p) }
    }

    /// Command that runs `task`, or `None` if the project has no such task.
    pub fn command_for(&self, task: &TaskId) -> Option<CommandSpec> {
        let def = self.tasks.get(task)?;
        let vars = self.vars().with_task(task.as_str());

        let cwd = def
            .cwd
            .as_deref()
            .map(|c| self.resolve_dir(&vars.render(c)))
            .unwrap_or_else(|| self.root.clone());

        let mut spec = match &def.command {
            CommandTemplate::Shell(line) => CommandSpec::shell(&vars.render(line), cwd),
            CommandTemplate::Direct { program, args } => CommandSpec::new(vars.render(program), cwd)
                .args(args.iter().map(|a| vars.render(a))),
        };

        for (k, v) in &def.env {
            spec = spec.env(k.clone(), vars.render(v));
        }

        Some(spec)
    }

    /// Command that removes everything the toolchain generated.
    pub fn clean_command(&self) -> CommandSpec {
        let vars = self.vars();
        let line = match &self.clean {
            Some(line) => vars.render(line),
            None if cfg!(windows) => {
                format!("if exist \"{0}\" rmdir /S /Q \"{0}\"", self.build_dir.display())
            }
            None => format!("rm -rf '{}'", self.build_dir.display()),
        };
        CommandSpec::shell(&line, self.root.clone())
    }

    /// Artifact declared for `(task, kind)`, with templates rendered.
    pub fn artifact(&self, task: &TaskId, kind: ReportKind) -> Option<Artifact> {
        let report = self.reports.get(&(task.clone(), kind))?;
        let vars = self.vars().with_task(task.as_str());

        let path = report
            .path
            .as_deref()
            .map(|p| self.resolve_dir(&vars.render(p)))
            .unwrap_or_else(|| self.root.clone());

        Some(Artifact {
            name: report
                .name
                .clone()
                .unwrap_or_else(|| format!("{task} {kind}")),
            path,
            command: report.command.as_deref().map(|c| vars.render(c)),
            kind: report.kind,
            content: report.content,
            inline: report.inline.clone(),
        })
    }

    /// Console definition for a shell kind (`bash`, `powershell`, ...).
    pub fn console(&self, shell: &str) -> Option<ConsoleDefinition> {
        let term = self.terminals.get(shell)?;
        let vars = self.vars();
        Some(ConsoleDefinition {
            name: term
                .name
                .clone()
                .unwrap_or_else(|| format!("{} ({shell})", self.id)),
            command: vars.render(&term.command),
            args: term.args.iter().map(|a| vars.render(a)).collect(),
            post_command: term.post_command.as_deref().map(|c| vars.render(c)),
            cwd: self.root.clone(),
        })
    }
}
