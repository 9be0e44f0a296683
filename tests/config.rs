// tests/config.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, ProjectConfigBuilder, TaskConfigBuilder};
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use hdlrun::config::duration::parse_duration;
use hdlrun::config::{ConfigFile, load_and_validate, load_from_path};
use hdlrun::errors::HdlrunError;
use hdlrun::project::{CommandTemplate, Project};
use hdlrun::types::{ArtifactKind, ContentKind, ProjectId, ReportKind, Stage, TaskId};

type TestResult = Result<(), Box<dyn Error>>;

const FULL: &str = r#"
[config]
selected = "uart"
terminate_grace = "750ms"
kill_timeout = "1s"

[project.blinky]
root = "hw/blinky"

[project.blinky.task.Synthesize]
stage = "synthesize"
cmd = "quartus_syn {project}"

[project.uart]
root = "hw/uart"
build_dir = "output_files"
clean = "quartus_sh --clean {project}"

[project.uart.task.Synthesize]
stage = "synthesize"
program = "yosys"
args = ["-p", "synth -top {project}"]
cwd = "{build_dir}"
env = { TOP = "{project}" }

[project.uart.task.Synthesize.report.report]
kind = "summary"
content = "text_file"
path = "{build_dir}/{project}.syn.rpt"

[project.uart.task.Programmer]
stage = "viewer"
cmd = "quartus_pgmw"

[project.uart.task.Programmer.report.report]
kind = "command"
content = "file"
command = "quartus_pgmw {project}.sof"
path = "{root}"

[project.uart.terminal.bash]
command = "bash"
args = ["--login"]
post_command = "source {root}/env.sh"
"#;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("Hdlrun.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn expect_config_error(toml_src: &str) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), toml_src);
    match load_and_validate(&path) {
        Err(HdlrunError::ConfigError(msg)) => msg,
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn full_config_loads_and_builds_projects() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), FULL);

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.initial_selection(), Some("uart"));
    assert_eq!(cfg.config.terminate_grace(), Duration::from_millis(750));
    assert_eq!(cfg.config.kill_timeout(), Duration::from_secs(1));
    assert_eq!(cfg.config.drain_timeout(), Duration::from_secs(2));

    let projects = Project::all_from_config(&cfg, dir.path());
    assert_eq!(projects.len(), 2);
    let uart = &projects[1];
    assert_eq!(uart.id(), &ProjectId::from("uart"));
    assert_eq!(uart.root(), dir.path().join("hw/uart"));
    assert_eq!(uart.build_dir(), dir.path().join("hw/uart/output_files"));

    let synth = uart.task(&TaskId::from("Synthesize")).expect("task");
    assert_eq!(synth.stage, Stage::Synthesize);
    assert!(matches!(synth.command, CommandTemplate::Direct { .. }));

    let spec = uart.command_for(&TaskId::from("Synthesize")).expect("command");
    assert_eq!(spec.program, "yosys");
    assert_eq!(spec.args, ["-p", "synth -top uart"]);
    assert_eq!(spec.cwd, dir.path().join("hw/uart/output_files"));
    assert_eq!(spec.env, [("TOP".to_string(), "uart".to_string())]);

    let artifact = uart
        .artifact(&TaskId::from("Synthesize"), ReportKind::Report)
        .expect("artifact");
    assert_eq!(artifact.kind, ArtifactKind::Summary);
    assert_eq!(artifact.content, ContentKind::TextFile);
    assert_eq!(
        artifact.path,
        dir.path().join("hw/uart/output_files/uart.syn.rpt")
    );
    assert!(uart
        .artifact(&TaskId::from("Synthesize"), ReportKind::ReportDb)
        .is_none());

    let programmer = uart
        .artifact(&TaskId::from("Programmer"), ReportKind::Report)
        .expect("programmer");
    assert_eq!(programmer.command.as_deref(), Some("quartus_pgmw uart.sof"));
    assert_eq!(programmer.path, dir.path().join("hw/uart"));

    let console = uart.console("bash").expect("console");
    assert_eq!(console.args, ["--login"]);
    let expected_post = format!("source {}/env.sh", dir.path().join("hw/uart").display());
    assert_eq!(console.post_command.as_deref(), Some(expected_post.as_str()));

    let clean = uart.clean_command();
    assert!(clean.display().ends_with("quartus_sh --clean uart"));

    Ok(())
}

#[test]
fn shell_tasks_render_placeholders() -> TestResult {
    let project = ProjectConfigBuilder::new()
        .root("blinky")
        .task(
            "Place",
            TaskConfigBuilder::shell("quartus_fit {project} --task {task} > {build_dir}/fit.log")
                .stage(Stage::Place)
                .build(),
        )
        .into_project("blinky", "/work");

    let spec = project
        .command_for(&TaskId::from("Place"))
        .expect("command");
    assert_eq!(spec.cwd, Path::new("/work/blinky"));
    assert_eq!(
        spec.args.last().map(String::as_str),
        Some("quartus_fit blinky --task Place > /work/blinky/build/fit.log")
    );
    assert!(project.command_for(&TaskId::from("Route")).is_none());

    Ok(())
}

#[test]
fn selection_defaults_to_first_project() {
    let cfg: ConfigFile = ConfigFileBuilder::new()
        .with_project(
            "zeta",
            ProjectConfigBuilder::new()
                .task("A", TaskConfigBuilder::shell("true").build())
                .build(),
        )
        .with_project(
            "alpha",
            ProjectConfigBuilder::new()
                .task("A", TaskConfigBuilder::shell("true").build())
                .build(),
        )
        .build();

    assert_eq!(cfg.initial_selection(), Some("alpha"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_from_path(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, HdlrunError::IoError(_)));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "[project.blinky\nroot = ");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, HdlrunError::TomlError(_)));
}

#[test]
fn unknown_stage_is_rejected_at_parse_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        "[project.a.task.T]\nstage = \"simulate\"\ncmd = \"true\"\n",
    );
    assert!(matches!(
        load_and_validate(&path),
        Err(HdlrunError::TomlError(_))
    ));
}

#[test]
fn config_without_projects_is_rejected() {
    let msg = expect_config_error("[config]\nterminate_grace = \"1s\"\n");
    assert!(msg.contains("at least one"));
}

#[test]
fn unknown_selected_project_is_rejected() {
    let msg = expect_config_error(
        "[config]\nselected = \"ghost\"\n[project.a.task.T]\ncmd = \"true\"\n",
    );
    assert!(msg.contains("ghost"));
}

#[test]
fn bad_durations_are_rejected() {
    let msg = expect_config_error(
        "[config]\nkill_timeout = \"soon\"\n[project.a.task.T]\ncmd = \"true\"\n",
    );
    assert!(msg.contains("kill_timeout"));

    let msg = expect_config_error(
        "[config]\nterminate_grace = \"6000000000000000h\"\n[project.a.task.T]\ncmd = \"true\"\n",
    );
    assert!(msg.contains("terminate_grace"));
    assert!(msg.contains("too large"));
}

#[test]
fn task_needs_exactly_one_command_form() {
    let both = expect_config_error(
        "[project.a.task.T]\ncmd = \"true\"\nprogram = \"true\"\n",
    );
    assert!(both.contains("both"));

    let neither = expect_config_error("[project.a.task.T]\nstage = \"place\"\n");
    assert!(neither.contains("either"));

    let args_with_cmd = expect_config_error(
        "[project.a.task.T]\ncmd = \"true\"\nargs = [\"x\"]\n",
    );
    assert!(args_with_cmd.contains("args"));
}

#[test]
fn unknown_placeholders_are_rejected() {
    let msg = expect_config_error("[project.a.task.T]\ncmd = \"run {device}\"\n");
    assert!(msg.contains("device"));

    let msg = expect_config_error(
        "[project.a]\nbuild_dir = \"{out}\"\n[project.a.task.T]\ncmd = \"true\"\n",
    );
    assert!(msg.contains("build_dir"));
}

#[test]
fn unknown_report_kinds_are_rejected() {
    let msg = expect_config_error(
        "[project.a.task.T]\ncmd = \"true\"\n\
         [project.a.task.T.report.schematic]\nkind = \"summary\"\ncontent = \"text_file\"\n",
    );
    assert!(msg.contains("schematic"));
}

#[test]
fn command_artifacts_need_a_command() {
    let msg = expect_config_error(
        "[project.a.task.T]\ncmd = \"true\"\n\
         [project.a.task.T.report.report]\nkind = \"command\"\ncontent = \"file\"\n",
    );
    assert!(msg.contains("command"));
}

#[test]
fn empty_terminal_commands_are_rejected() {
    let msg = expect_config_error(
        "[project.a.task.T]\ncmd = \"true\"\n[project.a.terminal.bash]\ncommand = \" \"\n",
    );
    assert!(msg.contains("bash"));
}

#[test]
fn durations_accept_the_usual_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
    assert_eq!(parse_duration("6000000000000000h"), Err("duration too large".to_string()));
    assert!(parse_duration("18446744073709551615m").is_err());
}

#[test]
fn builder_configs_go_through_the_same_validation() {
    let raw = ConfigFileBuilder::new()
        .with_project(
            "uart",
            ProjectConfigBuilder::new()
                .task(
                    "Synthesize",
                    TaskConfigBuilder::program("yosys", &["-p", "synth -top {top}"]).build(),
                )
                .build(),
        )
        .build_raw();

    match ConfigFile::try_from(raw) {
        Err(HdlrunError::ConfigError(msg)) => assert!(msg.contains("top")),
        other => panic!("expected config error, got {other:?}"),
    }
}
