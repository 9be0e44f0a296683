#![allow(dead_code)]

pub use hdlrun_test_utils::{builders, init_tracing, wait_until, with_timeout};

use std::path::Path;
use std::sync::Arc;

use hdlrun::engine::{DispatchTable, MultiProjectCoordinator};
use hdlrun::fs::mock::MockFileSystem;
use hdlrun::project::Project;
use hdlrun_test_utils::{
    FakeBackend, MemorySink, RecordingLauncher, RecordingNotifier, ScriptedConfirmer,
};

use hdlrun::types::Stage;
use hdlrun_test_utils::builders::{ProjectConfigBuilder, TaskConfigBuilder};

/// Coordinator wired to in-memory collaborators, with handles to all of
/// them for assertions.
pub struct Harness {
    pub coordinator: MultiProjectCoordinator,
    pub backend: FakeBackend,
    pub sink: MemorySink,
    pub notifier: RecordingNotifier,
    pub launcher: RecordingLauncher,
    pub confirmer: ScriptedConfirmer,
    pub fs: MockFileSystem,
}

impl Harness {
    pub fn new(backend: FakeBackend, answers: &[bool]) -> Self {
        Self::with_launcher(backend, answers, RecordingLauncher::new())
    }

    pub fn with_launcher(
        backend: FakeBackend,
        answers: &[bool],
        launcher: RecordingLauncher,
    ) -> Self {
        let sink = MemorySink::new();
        let notifier = RecordingNotifier::new();
        let confirmer = ScriptedConfirmer::new(answers);
        let fs = MockFileSystem::new();

        let coordinator = MultiProjectCoordinator::builder()
            .backend(Arc::new(backend.clone()))
            .launcher(Arc::new(launcher.clone()))
            .filesystem(Arc::new(fs.clone()))
            .notifier(Arc::new(notifier.clone()))
            .confirmer(Arc::new(confirmer.clone()))
            .sink(Arc::new(sink.clone()))
            .dispatch(DispatchTable::default())
            .build();

        Self {
            coordinator,
            backend,
            sink,
            notifier,
            launcher,
            confirmer,
            fs,
        }
    }
}

/// A project with the usual FPGA flow plus a viewer task.
pub fn fpga_project(id: &str, base: impl AsRef<Path>) -> Project {
    let task = |stage: Stage, cmd: &str| TaskConfigBuilder::shell(cmd).stage(stage).build();

    ProjectConfigBuilder::new()
        .root(id)
        .task("Analyze", task(Stage::Analyze, "quartus_map {project} --analysis_and_elaboration"))
        .task("Synthesize", task(Stage::Synthesize, "quartus_syn {project}"))
        .task("Place", task(Stage::Place, "quartus_fit {project}"))
        .task("Route", task(Stage::Route, "quartus_fit {project} --route"))
        .task("Bitstream", task(Stage::Bitstream, "quartus_asm {project}"))
        .task("RtlViewer", task(Stage::Viewer, "qnui {project}"))
        .terminal("bash", "bash", Some("source {root}/settings.sh"))
        .into_project(id, base)
}
