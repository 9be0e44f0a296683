// src/artifacts/resolver.rs

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::artifacts::{Artifact, ArtifactError};
use crate::exec::{CommandSpec, DetachedLauncher};
use crate::fs::FileSystem;
use crate::project::Project;
use crate::types::{ArtifactKind, ContentKind, ReportKind, TaskId};

/// What the resolver does with an artifact, decided by kind x content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    /// Spawn the artifact's command detached; do not wait.
    Launch,
    /// Text file that must exist.
    RequireFile,
    /// Markup returned inline for embedding.
    Inline,
    /// Structured log database that must exist.
    RequireDatabase,
    /// Path handed through untouched.
    PassThrough,
}

pub fn classify(kind: ArtifactKind, content: ContentKind) -> Handling {
    match (kind, content) {
        (ArtifactKind::Command, _) => Handling::Launch,
        (ArtifactKind::Summary, ContentKind::TextFile) => Handling::RequireFile,
        (ArtifactKind::Summary, ContentKind::Html | ContentKind::HtmlFile | ContentKind::Text) => {
            Handling::Inline
        }
        (ArtifactKind::Log, ContentKind::Database) => Handling::RequireDatabase,
        _ => Handling::PassThrough,
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArtifact {
    Launched { artifact: Artifact, pid: Option<u32> },
    TextFile(Artifact),
    Markup { artifact: Artifact, content: String },
    LogDatabase(Artifact),
    Reference(Artifact),
}

impl ResolvedArtifact {
    pub fn artifact(&self) -> &Artifact {
        match self {
            ResolvedArtifact::Launched { artifact, .. }
            | ResolvedArtifact::Markup { artifact, .. }
            | ResolvedArtifact::TextFile(artifact)
            | ResolvedArtifact::LogDatabase(artifact)
            | ResolvedArtifact::Reference(artifact) => artifact,
        }
    }
}

/// Maps (task, report kind) to a described, checked output.
#[derive(Clone)]
pub struct ArtifactResolver {
    fs: Arc<dyn FileSystem>,
    launcher: Arc<dyn DetachedLauncher>,
}

impl std::fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl ArtifactResolver {
    pub fn new(fs: Arc<dyn FileSystem>, launcher: Arc<dyn DetachedLauncher>) -> Self {
        Self { fs, launcher }
    }

    /// Resolve `report` for `task`.
    ///
    /// Never mutates anything; the only side effect is the detached spawn for
    /// command artifacts. Unsupported report kinds are refused before the
    /// project or the filesystem is consulted.
    pub fn resolve(
        &self,
        project: &Project,
        task: &TaskId,
        report: ReportKind,
    ) -> Result<ResolvedArtifact, ArtifactError> {
        if !report.is_supported() {
            return Err(ArtifactError::Unsupported { report });
        }

        let artifact = project
            .artifact(task, report)
            .ok_or_else(|| ArtifactError::NotDeclared {
                task: task.clone(),
                report,
            })?;

        let handling = classify(artifact.kind, artifact.content);
        debug!(
            project = %project.id(),
            task = %task,
            report = %report,
            ?handling,
            path = %artifact.path.display(),
            "resolving artifact"
        );

        match handling {
            Handling::Launch => self.launch(artifact),
            Handling::RequireFile => {
                self.require_exists(&artifact)?;
                Ok(ResolvedArtifact::TextFile(artifact))
            }
            Handling::RequireDatabase => {
                self.require_exists(&artifact)?;
                Ok(ResolvedArtifact::LogDatabase(artifact))
            }
            Handling::Inline => {
                let content = self.inline_content(&artifact)?;
                Ok(ResolvedArtifact::Markup { artifact, content })
            }
            Handling::PassThrough => Ok(ResolvedArtifact::Reference(artifact)),
        }
    }

    fn launch(&self, artifact: Artifact) -> Result<ResolvedArtifact, ArtifactError> {
        let command = artifact.command.clone().unwrap_or_default();
        let spec = CommandSpec::shell(&command, artifact.path.clone());

        match self.launcher.launch(&spec) {
            Ok(pid) => {
                info!(pid, cmd = %command, "artifact command launched");
                Ok(ResolvedArtifact::Launched { artifact, pid })
            }
            Err(e) => Err(ArtifactError::Launch {
                command,
                reason: format!("{e:#}"),
            }),
        }
    }

    fn require_exists(&self, artifact: &Artifact) -> Result<(), ArtifactError> {
        if self.fs.exists(&artifact.path) {
            Ok(())
        } else {
            warn!(path = %artifact.path.display(), "report does not exist");
            Err(ArtifactError::NotFound {
                path: artifact.path.clone(),
            })
        }
    }

    fn inline_content(&self, artifact: &Artifact) -> Result<String, ArtifactError> {
        if let Some(content) = &artifact.inline {
            return Ok(content.clone());
        }

        self.require_exists(artifact)?;
        self.fs
            .read_to_string(&artifact.path)
            .map_err(|e| ArtifactError::Read {
                path: artifact.path.clone(),
                reason: format!("{e:#}"),
            })
    }
}
