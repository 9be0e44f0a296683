// tests/run_state.rs

mod common;
use crate::common::init_tracing;

use hdlrun::exec::ExecutionStatus;
use hdlrun::state::{ProjectRunState, RunKind, RunPhase, TaskState};
use hdlrun::types::TaskId;

fn synth() -> RunKind {
    RunKind::Task(TaskId::from("Synthesize"))
}

#[test]
fn begin_complete_settle_walks_the_phases() {
    init_tracing();
    let mut state = ProjectRunState::new();
    assert_eq!(state.phase(), RunPhase::Idle);

    let id = state.begin(synth()).expect("idle project accepts a run");
    assert_eq!(state.phase(), RunPhase::Running);
    assert_eq!(state.active_run(), Some(id));
    assert_eq!(state.current(), Some(&synth()));

    assert_eq!(
        state.complete(id, ExecutionStatus::Finished),
        Some(RunPhase::Finished)
    );
    assert_eq!(state.active_run(), None);
    assert_eq!(
        state.task_state(&TaskId::from("Synthesize")),
        TaskState::Finished
    );

    assert!(state.settle());
    assert_eq!(state.phase(), RunPhase::Idle);
    assert!(!state.settle());
}

#[test]
fn second_begin_is_rejected_with_the_running_kind() {
    init_tracing();
    let mut state = ProjectRunState::new();
    let id = state.begin(synth()).expect("first run");

    let rejected = state
        .begin(RunKind::Task(TaskId::from("Place")))
        .expect_err("busy project rejects");
    assert_eq!(rejected.running, synth());

    // The running run is untouched.
    assert_eq!(state.active_run(), Some(id));
    assert_eq!(state.current(), Some(&synth()));
}

#[test]
fn cancelled_and_failed_runs_end_in_failed() {
    init_tracing();
    let mut state = ProjectRunState::new();

    let id = state.begin(synth()).expect("run");
    assert_eq!(
        state.complete(id, ExecutionStatus::Cancelled),
        Some(RunPhase::Failed)
    );
    assert_eq!(state.task_state(&TaskId::from("Synthesize")), TaskState::Failed);
    state.settle();

    let id = state.begin(synth()).expect("run");
    assert_eq!(
        state.complete(id, ExecutionStatus::Failed),
        Some(RunPhase::Failed)
    );
    assert!(!state.last_succeeded(&TaskId::from("Synthesize")));
}

#[test]
fn stale_and_duplicate_completions_are_ignored() {
    init_tracing();
    let mut state = ProjectRunState::new();

    let first = state.begin(synth()).expect("run");
    assert!(state.complete(first, ExecutionStatus::Finished).is_some());
    assert!(state.complete(first, ExecutionStatus::Failed).is_none());
    state.settle();

    let second = state.begin(RunKind::Task(TaskId::from("Place"))).expect("run");
    assert_ne!(first, second);
    assert!(second > first);

    // A late completion of the first run must not end the second.
    assert!(state.complete(first, ExecutionStatus::Failed).is_none());
    assert_eq!(state.phase(), RunPhase::Running);
    assert_eq!(state.active_run(), Some(second));
    assert_eq!(state.task_state(&TaskId::from("Synthesize")), TaskState::Finished);
}

#[test]
fn begin_settles_an_unsettled_terminal_phase() {
    init_tracing();
    let mut state = ProjectRunState::new();

    let id = state.begin(synth()).expect("run");
    state.complete(id, ExecutionStatus::Failed);
    assert_eq!(state.phase(), RunPhase::Failed);

    assert!(state.begin(synth()).is_ok());
    assert_eq!(state.phase(), RunPhase::Running);
}

#[test]
fn task_state_tracks_history_per_task() {
    init_tracing();
    let mut state = ProjectRunState::new();
    let synth_id = TaskId::from("Synthesize");
    let place_id = TaskId::from("Place");

    assert_eq!(state.task_state(&synth_id), TaskState::NotRun);

    let id = state.begin(synth()).expect("run");
    assert_eq!(state.task_state(&synth_id), TaskState::Running);
    assert_eq!(state.task_state(&place_id), TaskState::NotRun);

    state.complete(id, ExecutionStatus::Finished);
    state.settle();
    assert_eq!(state.task_state(&synth_id), TaskState::Finished);
    assert!(state.last_succeeded(&synth_id));

    // While another task runs, the earlier result stays visible.
    let id = state.begin(RunKind::Task(place_id.clone())).expect("run");
    assert_eq!(state.task_state(&synth_id), TaskState::Finished);
    assert_eq!(state.task_state(&place_id), TaskState::Running);
    state.complete(id, ExecutionStatus::Failed);
    state.settle();
    assert_eq!(state.task_state(&place_id), TaskState::Failed);
}

#[test]
fn successful_clean_forgets_every_task() {
    init_tracing();
    let mut state = ProjectRunState::new();
    let synth_id = TaskId::from("Synthesize");

    let id = state.begin(synth()).expect("run");
    state.complete(id, ExecutionStatus::Finished);
    state.settle();

    let id = state.begin(RunKind::Clean).expect("clean");
    assert_eq!(state.task_state(&synth_id), TaskState::Finished);
    state.complete(id, ExecutionStatus::Finished);
    state.settle();

    assert_eq!(state.task_state(&synth_id), TaskState::NotRun);
    assert!(!state.last_succeeded(&synth_id));
}

#[test]
fn failed_clean_keeps_history() {
    init_tracing();
    let mut state = ProjectRunState::new();
    let synth_id = TaskId::from("Synthesize");

    let id = state.begin(synth()).expect("run");
    state.complete(id, ExecutionStatus::Finished);
    state.settle();

    let id = state.begin(RunKind::Clean).expect("clean");
    state.complete(id, ExecutionStatus::Cancelled);
    state.settle();

    assert_eq!(state.task_state(&synth_id), TaskState::Finished);
}

#[test]
fn run_kinds_display_their_task() {
    assert_eq!(synth().to_string(), "Synthesize");
    assert_eq!(RunKind::Clean.to_string(), "clean");
    assert_eq!(RunKind::Clean.task(), None);
}
