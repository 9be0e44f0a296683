// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, ProjectConfig, RawConfigFile, TaskConfig};
use crate::errors::{HdlrunError, Result};
use crate::project::template::unknown_placeholders;
use crate::types::{ArtifactKind, ReportKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = HdlrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.project))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_projects(cfg)?;
    validate_global_config(cfg)?;
    for (name, project) in cfg.project.iter() {
        validate_project(name, project)?;
    }
    Ok(())
}

fn ensure_has_projects(cfg: &RawConfigFile) -> Result<()> {
    if cfg.project.is_empty() {
        return Err(HdlrunError::ConfigError(
            "config must contain at least one [project.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if let Some(selected) = &cfg.config.selected {
        if !cfg.project.contains_key(selected) {
            return Err(HdlrunError::ConfigError(format!(
                "[config].selected refers to unknown project '{}'",
                selected
            )));
        }
    }

    for (key, value) in [
        ("terminate_grace", &cfg.config.terminate_grace),
        ("kill_timeout", &cfg.config.kill_timeout),
        ("drain_timeout", &cfg.config.drain_timeout),
    ] {
        parse_duration(value).map_err(|e| {
            HdlrunError::ConfigError(format!("[config].{key} = \"{value}\": {e}"))
        })?;
    }

    Ok(())
}

fn validate_project(name: &str, project: &ProjectConfig) -> Result<()> {
    let mut templates: Vec<(String, &str)> = vec![("build_dir".to_string(), &project.build_dir)];
    if let Some(root) = &project.root {
        templates.push(("root".to_string(), root));
    }
    if let Some(clean) = &project.clean {
        templates.push(("clean".to_string(), clean));
    }

    for (task_id, task) in project.task.iter() {
        validate_task(name, task_id, task)?;

        let prefix = format!("task.{task_id}");
        for (field, value) in task_templates(task) {
            templates.push((format!("{prefix}.{field}"), value));
        }
    }

    for (field, template) in templates {
        let unknown = unknown_placeholders(template);
        if !unknown.is_empty() {
            return Err(HdlrunError::ConfigError(format!(
                "project '{}': {} uses unknown placeholder(s) {:?}",
                name, field, unknown
            )));
        }
    }

    for (shell, terminal) in project.terminal.iter() {
        if terminal.command.trim().is_empty() {
            return Err(HdlrunError::ConfigError(format!(
                "project '{}': terminal '{}' has an empty command",
                name, shell
            )));
        }
    }

    Ok(())
}

fn validate_task(project: &str, task_id: &str, task: &TaskConfig) -> Result<()> {
    match (&task.cmd, &task.program) {
        (Some(_), Some(_)) => {
            return Err(HdlrunError::ConfigError(format!(
                "project '{}': task '{}' sets both `cmd` and `program`",
                project, task_id
            )));
        }
        (None, None) => {
            return Err(HdlrunError::ConfigError(format!(
                "project '{}': task '{}' needs either `cmd` or `program`",
                project, task_id
            )));
        }
        _ => {}
    }

    if task.cmd.is_some() && !task.args.is_empty() {
        return Err(HdlrunError::ConfigError(format!(
            "project '{}': task '{}' sets `args` together with `cmd`; put them in the command line",
            project, task_id
        )));
    }

    for (kind, report) in task.report.iter() {
        kind.parse::<ReportKind>().map_err(|e| {
            HdlrunError::ConfigError(format!(
                "project '{}': task '{}': {}",
                project, task_id, e
            ))
        })?;

        if report.kind == ArtifactKind::Command && report.command.is_none() {
            return Err(HdlrunError::ConfigError(format!(
                "project '{}': task '{}' report '{}' is a command artifact without `command`",
                project, task_id, kind
            )));
        }
    }

    Ok(())
}

fn task_templates(task: &TaskConfig) -> Vec<(String, &str)> {
    let mut out: Vec<(String, &str)> = Vec::new();
    if let Some(cmd) = &task.cmd {
        out.push(("cmd".to_string(), cmd));
    }
    if let Some(program) = &task.program {
        out.push(("program".to_string(), program));
    }
    for (i, arg) in task.args.iter().enumerate() {
        out.push((format!("args[{i}]"), arg));
    }
    if let Some(cwd) = &task.cwd {
        out.push(("cwd".to_string(), cwd));
    }
    for (kind, report) in task.report.iter() {
        if let Some(path) = &report.path {
            out.push((format!("report.{kind}.path"), path));
        }
        if let Some(command) = &report.command {
            out.push((format!("report.{kind}.command"), command));
        }
    }
    out
}
