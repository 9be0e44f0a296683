// tests/task_runner.rs
//
// Real processes through `sh`; unix only.

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, wait_until, with_timeout};

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hdlrun::exec::{
    CommandSpec, ExecutionResult, ExecutionStatus, LogSink, RunRequest, TaskRunner,
    TerminationPolicy,
};
use hdlrun::state::RunKind;
use hdlrun::types::{ProjectId, TaskId};
use hdlrun_test_utils::MemorySink;

type TestResult = Result<(), Box<dyn Error>>;

fn request(command: CommandSpec) -> RunRequest {
    RunRequest {
        project: ProjectId::from("blinky"),
        kind: RunKind::Task(TaskId::from("Synthesize")),
        command,
    }
}

fn runner() -> TaskRunner {
    TaskRunner::new(
        TerminationPolicy {
            grace: Duration::from_millis(500),
            kill_timeout: Duration::from_secs(2),
        },
        Duration::from_millis(500),
    )
}

async fn run_to_end(runner: TaskRunner, command: CommandSpec, sink: &MemorySink) -> ExecutionResult {
    let handle = runner.run(request(command), Arc::new(sink.clone()));
    let (_control, completion) = handle.into_parts();
    with_timeout(completion)
        .await
        .expect("runner must deliver a result")
}

#[tokio::test]
async fn output_arrives_in_order_with_file_markers_rewritten() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let cmd = CommandSpec::shell(
        "echo 'Info: start'; echo 'Info: File: /tmp/top.syn.rpt Line: 3'; echo done",
        dir.path(),
    );
    let result = run_to_end(runner(), cmd, &sink).await;

    assert_eq!(result.status, ExecutionStatus::Finished);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.termination_confirmed);
    assert_eq!(
        sink.lines(),
        [
            "Info: start",
            "Info: file:///tmp/top.syn.rpt Line: 3",
            "done"
        ]
    );

    Ok(())
}

#[tokio::test]
async fn stderr_is_forwarded_too() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let cmd = CommandSpec::shell("echo 'Error: File: a.v' 1>&2", dir.path());
    let result = run_to_end(runner(), cmd, &sink).await;

    assert_eq!(result.status, ExecutionStatus::Finished);
    assert_eq!(sink.lines(), ["Error: file://a.v"]);

    Ok(())
}

#[tokio::test]
async fn nonzero_exit_is_a_failure_with_its_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let result = run_to_end(runner(), CommandSpec::shell("exit 3", dir.path()), &sink).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.error.is_none());

    Ok(())
}

#[tokio::test]
async fn spawn_failure_is_delivered_as_a_result() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let handle = runner().run(
        request(CommandSpec::new("/nonexistent/quartus_syn", dir.path())),
        Arc::new(sink.clone()),
    );
    assert_eq!(handle.pid(), None);

    let (mut control, completion) = handle.into_parts();
    assert!(!control.cancel());

    let result = with_timeout(completion).await?;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.error.is_some());
    assert_eq!(sink.lines().len(), 1);
    assert!(sink.lines()[0].contains("failed to start"));

    Ok(())
}

/// Records, per line, whether `held` was free when the line arrived.
struct LockObservingSink {
    held: Arc<Mutex<()>>,
    seen: Mutex<Vec<(String, bool)>>,
}

impl LogSink for LockObservingSink {
    fn append(&self, line: &str) {
        let free = self.held.try_lock().is_ok();
        self.seen.lock().unwrap().push((line.to_string(), free));
    }
}

#[tokio::test]
async fn spawn_failure_reaches_the_sink_after_run_returns() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let held = Arc::new(Mutex::new(()));
    let sink = Arc::new(LockObservingSink {
        held: Arc::clone(&held),
        seen: Mutex::new(Vec::new()),
    });

    // Stands in for a caller that keeps its own lock across `run`.
    let guard = held.lock().unwrap();
    let handle = runner().run(
        request(CommandSpec::new("/nonexistent/quartus_syn", dir.path())),
        sink.clone(),
    );
    drop(guard);

    let result = with_timeout(handle.into_parts().1).await?;
    assert_eq!(result.status, ExecutionStatus::Failed);

    let seen = sink.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].0.contains("failed to start"));
    assert!(seen[0].1, "sink was called while the caller still held its lock");

    Ok(())
}

#[tokio::test]
async fn direct_programs_get_args_env_and_cwd() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let cmd = CommandSpec::new("sh", dir.path())
        .args(["-c", "printf '%s\\n' \"$1\" \"$TOP\"; pwd", "sh", "a b"])
        .env("TOP", "blinky");
    let result = run_to_end(runner(), cmd, &sink).await;

    assert_eq!(result.status, ExecutionStatus::Finished);
    let lines = sink.lines();
    assert_eq!(lines[0], "a b");
    assert_eq!(lines[1], "blinky");
    assert_eq!(
        std::fs::canonicalize(&lines[2])?,
        std::fs::canonicalize(dir.path())?
    );

    Ok(())
}

#[tokio::test]
async fn output_held_open_by_a_descendant_follows_the_result() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let fast_drain = TaskRunner::new(TerminationPolicy::default(), Duration::from_millis(100));
    let cmd = CommandSpec::shell("echo first; (sleep 1; echo late) & exit 0", dir.path());
    let result = run_to_end(fast_drain, cmd, &sink).await;

    assert_eq!(result.status, ExecutionStatus::Finished);
    assert!(sink.lines().contains(&"first".to_string()));
    assert!(!sink.lines().contains(&"late".to_string()));

    with_timeout(wait_until(|| sink.lines().contains(&"late".to_string()))).await;

    Ok(())
}

#[tokio::test]
async fn cancel_terminates_the_process_tree() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();
    let pid_file = dir.path().join("child.pid");

    let cmd = CommandSpec::shell("sleep 30 & echo $! > child.pid; wait", dir.path());
    let handle = runner().run(request(cmd), Arc::new(sink.clone()));
    assert!(handle.pid().is_some());
    let (mut control, completion) = handle.into_parts();

    with_timeout(wait_until(|| {
        std::fs::read_to_string(&pid_file)
            .map(|s| s.trim().parse::<u32>().is_ok())
            .unwrap_or(false)
    }))
    .await;
    let child: u32 = std::fs::read_to_string(&pid_file)?.trim().parse()?;

    assert!(control.cancel());
    let result = with_timeout(completion).await?;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.termination_confirmed);
    assert_eq!(result.exit_code, None);

    with_timeout(wait_until(|| !process_alive(child))).await;

    Ok(())
}

#[tokio::test]
async fn processes_ignoring_sigterm_are_killed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();

    let runner = TaskRunner::new(
        TerminationPolicy {
            grace: Duration::from_millis(300),
            kill_timeout: Duration::from_secs(2),
        },
        Duration::from_millis(500),
    );
    let cmd = CommandSpec::shell("trap '' TERM; echo ready; sleep 30", dir.path());
    let handle = runner.run(request(cmd), Arc::new(sink.clone()));
    let (mut control, completion) = handle.into_parts();

    with_timeout(wait_until(|| sink.lines().contains(&"ready".to_string()))).await;
    assert!(control.cancel());
    let result = with_timeout(completion).await?;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.termination_confirmed);
    assert!(result.duration >= Duration::from_millis(300));

    Ok(())
}

#[tokio::test]
async fn cancel_after_leader_exit_kills_descendants_holding_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = MemorySink::new();
    let pid_file = dir.path().join("child.pid");

    let long_drain = TaskRunner::new(
        TerminationPolicy {
            grace: Duration::from_millis(300),
            kill_timeout: Duration::from_secs(2),
        },
        Duration::from_secs(10),
    );
    let cmd = CommandSpec::shell(
        "echo first; (sleep 5; echo late) & echo $! > child.pid; exit 0",
        dir.path(),
    );
    let handle = long_drain.run(request(cmd), Arc::new(sink.clone()));
    let leader = handle.pid().ok_or("no leader pid")?;
    let (mut control, completion) = handle.into_parts();

    with_timeout(wait_until(|| {
        std::fs::read_to_string(&pid_file)
            .map(|s| s.trim().parse::<u32>().is_ok())
            .unwrap_or(false)
    }))
    .await;
    let child: u32 = std::fs::read_to_string(&pid_file)?.trim().parse()?;
    with_timeout(wait_until(|| !process_alive(leader))).await;
    assert!(process_alive(child));

    assert!(control.cancel());
    let result = with_timeout(completion).await?;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.termination_confirmed);
    assert!(result.duration < Duration::from_secs(5));
    assert!(!sink.lines().contains(&"late".to_string()));
    with_timeout(wait_until(|| !process_alive(child))).await;

    Ok(())
}

/// Alive means present in /proc and not a zombie. Always `false` where
/// there is no /proc.
fn process_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(Path::new("/proc").join(pid.to_string()).join("stat"))
    else {
        return false;
    };
    let state = stat
        .rsplit_once(") ")
        .and_then(|(_, rest)| rest.chars().next());
    !matches!(state, Some('Z') | Some('X') | None)
}
