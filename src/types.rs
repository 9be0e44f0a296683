// src/types.rs

//! Small shared vocabulary types: identifiers, toolchain stages and the
//! artifact/report classifications used across the crate.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of a project registered with the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Stable task identifier (e.g. `Synthesize`, `Place`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Toolchain stage a task represents.
///
/// The stage selects the handler in the coordinator's dispatch table;
/// everything except [`Stage::Viewer`] goes through the tracked task runner
/// by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analyze,
    Synthesize,
    Packing,
    Place,
    Route,
    Sta,
    Bitstream,
    Compile,
    /// Opens an external viewer; launched detached and never tracked.
    Viewer,
    #[default]
    Other,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Synthesize => "synthesize",
            Stage::Packing => "packing",
            Stage::Place => "place",
            Stage::Route => "route",
            Stage::Sta => "sta",
            Stage::Bitstream => "bitstream",
            Stage::Compile => "compile",
            Stage::Viewer => "viewer",
            Stage::Other => "other",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analyze" => Ok(Stage::Analyze),
            "synthesize" => Ok(Stage::Synthesize),
            "packing" => Ok(Stage::Packing),
            "place" => Ok(Stage::Place),
            "route" => Ok(Stage::Route),
            "sta" => Ok(Stage::Sta),
            "bitstream" => Ok(Stage::Bitstream),
            "compile" => Ok(Stage::Compile),
            "viewer" => Ok(Stage::Viewer),
            "other" => Ok(Stage::Other),
            other => Err(format!("invalid stage: {other}")),
        }
    }
}

/// Kind of report a caller can request for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Report,
    TimingAnalyzer,
    TechnologyMapViewer,
    SnapshotViewer,
    ReportDb,
}

impl ReportKind {
    /// Report kinds with no implementation at all.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            ReportKind::TechnologyMapViewer | ReportKind::SnapshotViewer
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Report => "report",
            ReportKind::TimingAnalyzer => "timing-analyzer",
            ReportKind::TechnologyMapViewer => "technology-map-viewer",
            ReportKind::SnapshotViewer => "snapshot-viewer",
            ReportKind::ReportDb => "report-db",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(ReportKind::Report),
            "timing-analyzer" => Ok(ReportKind::TimingAnalyzer),
            "technology-map-viewer" => Ok(ReportKind::TechnologyMapViewer),
            "snapshot-viewer" => Ok(ReportKind::SnapshotViewer),
            "report-db" => Ok(ReportKind::ReportDb),
            other => Err(format!(
                "invalid report kind: {other} (expected report, timing-analyzer, \
                 technology-map-viewer, snapshot-viewer or report-db)"
            )),
        }
    }
}

/// What an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The artifact is itself an invokable command.
    Command,
    ConsoleLog,
    Summary,
    Log,
    #[serde(alias = "build")]
    Folder,
    Waveform,
    Other,
}

/// How an artifact's content is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    HtmlFile,
    TextFile,
    Html,
    Text,
    File,
    Folder,
    Fst,
    Database,
}
