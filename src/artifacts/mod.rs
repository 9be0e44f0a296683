// src/artifacts/mod.rs

//! Artifacts: the files, folders and commands a task leaves behind.
//!
//! Artifacts are derived views, recomputed from the project on every request
//! and never cached. [`resolver`] decides what to do with one.

pub mod resolver;

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ArtifactKind, ContentKind, ReportKind, TaskId};

pub use resolver::{ArtifactResolver, Handling, ResolvedArtifact, classify};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    /// Command line when the artifact is itself invokable.
    pub command: Option<String>,
    pub kind: ArtifactKind,
    pub content: ContentKind,
    pub inline: Option<String>,
}

/// Why an artifact request produced nothing. None of these touch run state.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("{report} is not supported yet")]
    Unsupported { report: ReportKind },

    #[error("the report {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("task '{task}' has no {report} artifact")]
    NotDeclared { task: TaskId, report: ReportKind },

    #[error("failed to launch `{command}`: {reason}")]
    Launch { command: String, reason: String },

    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
}
