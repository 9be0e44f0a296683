use std::collections::BTreeMap;
use std::path::Path;

use hdlrun::config::{
    ConfigFile, ConfigSection, ProjectConfig, RawConfigFile, ReportConfig, TaskConfig,
    TerminalConfig,
};
use hdlrun::project::Project;
use hdlrun::types::{ArtifactKind, ContentKind, ProjectId, Stage};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                project: BTreeMap::new(),
            },
        }
    }

    pub fn with_project(mut self, name: &str, project: ProjectConfig) -> Self {
        self.config.project.insert(name.to_string(), project);
        self
    }

    pub fn selected(mut self, name: &str) -> Self {
        self.config.config.selected = Some(name.to_string());
        self
    }

    pub fn terminate_grace(mut self, value: &str) -> Self {
        self.config.config.terminate_grace = value.to_string();
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectConfigBuilder {
    project: ProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new() -> Self {
        Self {
            project: ProjectConfig {
                build_dir: "build".to_string(),
                ..ProjectConfig::default()
            },
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.project.root = Some(root.to_string());
        self
    }

    pub fn build_dir(mut self, dir: &str) -> Self {
        self.project.build_dir = dir.to_string();
        self
    }

    pub fn clean(mut self, cmd: &str) -> Self {
        self.project.clean = Some(cmd.to_string());
        self
    }

    pub fn task(mut self, name: &str, task: TaskConfig) -> Self {
        self.project.task.insert(name.to_string(), task);
        self
    }

    pub fn terminal(mut self, shell: &str, command: &str, post_command: Option<&str>) -> Self {
        self.project.terminal.insert(
            shell.to_string(),
            TerminalConfig {
                name: None,
                command: command.to_string(),
                args: vec![],
                post_command: post_command.map(str::to_string),
            },
        );
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }

    /// Build a `Project` with id `id`, resolving relative paths against
    /// `base_dir`.
    pub fn into_project(self, id: &str, base_dir: impl AsRef<Path>) -> Project {
        Project::from_config(ProjectId::new(id), &self.project, base_dir.as_ref())
    }
}

impl Default for ProjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Task run through the platform shell.
    pub fn shell(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task executing `program` directly.
    pub fn program(program: &str, args: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                program: Some(program.to_string()),
                args: args.iter().map(|a| a.to_string()).collect(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.task.stage = stage;
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.task.cwd = Some(cwd.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn report(mut self, kind: &str, report: ReportConfig) -> Self {
        self.task.report.insert(kind.to_string(), report);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Report declaration with the given kind, content and optional path.
pub fn report(kind: ArtifactKind, content: ContentKind, path: Option<&str>) -> ReportConfig {
    ReportConfig {
        name: None,
        kind,
        content,
        path: path.map(str::to_string),
        command: None,
        inline: None,
    }
}
