// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HdlrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project '{0}' is running; stop it before replacing it")]
    ProjectBusy(String),

    #[error("No project selected")]
    NoProjectSelected,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("No console definition for shell '{0}'")]
    ConsoleNotFound(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HdlrunError>;
