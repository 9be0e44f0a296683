// src/lib.rs

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod project;
pub mod state;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::artifacts::ResolvedArtifact;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, config_root_dir, load_and_validate};
use crate::engine::{
    AutoConfirm, Confirmer, MultiProjectCoordinator, RunOutcome, RunTicket, TerminalConfirmer,
};
use crate::exec::{ExecutionStatus, RealExecutorBackend, TaskRunner, TerminationPolicy};
use crate::project::Project;
use crate::types::{ProjectId, ReportKind, TaskId};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and project construction
/// - the coordinator with the real executor, launcher and filesystem
/// - the requested action (run, clean, report, console, list)
/// - Ctrl-C handling for tracked runs
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let base_dir = config_root_dir(&config_path);
    let projects = Project::all_from_config(&cfg, &base_dir);

    if args.dry_run {
        print_dry_run(&cfg, &projects);
        return Ok(());
    }

    let coordinator = build_coordinator(&cfg, args.yes);
    for project in projects {
        coordinator.register(project)?;
    }

    let selected = args
        .project
        .as_deref()
        .or_else(|| cfg.initial_selection())
        .map(ProjectId::from)
        .ok_or_else(|| anyhow!("no project to select"))?;
    coordinator.select(&selected)?;
    debug!(project = %selected, "initial selection");

    if let Some(task) = &args.task {
        let outcome = coordinator.run(&TaskId::from(task.as_str())).await?;
        return finish_outcome(&coordinator, outcome).await;
    }

    if args.clean {
        let outcome = coordinator.clean().await?;
        return finish_outcome(&coordinator, outcome).await;
    }

    if let Some(report) = &args.report {
        let (task, kind) = match report.as_slice() {
            [task, kind] => (
                TaskId::from(task.as_str()),
                kind.parse::<ReportKind>().map_err(|e| anyhow!(e))?,
            ),
            _ => bail!("--report expects TASK and KIND"),
        };
        return match coordinator.get_artifact(&task, kind)? {
            Ok(resolved) => {
                print_artifact(&resolved);
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
    }

    if let Some(shell) = &args.console {
        let console = coordinator.open_console(shell)?;
        println!("name:    {}", console.name);
        println!("command: {} {}", console.command, console.args.join(" "));
        println!("cwd:     {}", console.cwd.display());
        if let Some(post) = &console.post_command {
            println!("then:    {post}");
        }
        return Ok(());
    }

    print_list(&coordinator)
}

fn build_coordinator(cfg: &ConfigFile, assume_yes: bool) -> MultiProjectCoordinator {
    let policy = TerminationPolicy {
        grace: cfg.config.terminate_grace(),
        kill_timeout: cfg.config.kill_timeout(),
    };
    let runner = TaskRunner::new(policy, cfg.config.drain_timeout());

    let confirmer: Arc<dyn Confirmer> = if assume_yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(TerminalConfirmer)
    };

    MultiProjectCoordinator::builder()
        .backend(Arc::new(RealExecutorBackend::new(runner)))
        .confirmer(confirmer)
        .build()
}

async fn finish_outcome(coordinator: &MultiProjectCoordinator, outcome: RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Started(ticket) => wait_for_run(coordinator, ticket).await,
        RunOutcome::Rejected { running } => bail!("project is busy running {running}"),
        RunOutcome::Declined => {
            info!("nothing to do");
            Ok(())
        }
        RunOutcome::Delegated { pid } => {
            info!(?pid, "viewer launched");
            Ok(())
        }
        RunOutcome::LaunchFailed { reason } => bail!("launch failed: {reason}"),
    }
}

/// Wait for a tracked run; the first Ctrl-C stops it, the run's completion
/// still decides the exit status.
async fn wait_for_run(coordinator: &MultiProjectCoordinator, ticket: RunTicket) -> Result<()> {
    let project = ticket.project.clone();
    let kind = ticket.kind.clone();
    let wait = ticket.wait();
    tokio::pin!(wait);

    let mut stop_sent = false;
    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            signal = tokio::signal::ctrl_c(), if !stop_sent => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                stop_sent = true;
                let outcome = coordinator.stop_in(&project)?;
                info!(project = %project, task = %kind, ?outcome, "stop requested from terminal");
            }
        }
    };

    match result.status {
        ExecutionStatus::Finished => Ok(()),
        ExecutionStatus::Cancelled => bail!("{kind} was stopped"),
        ExecutionStatus::Failed => match (&result.error, result.exit_code) {
            (Some(err), _) => bail!("{kind} failed: {err}"),
            (None, Some(code)) => bail!("{kind} failed with exit code {code}"),
            (None, None) => bail!("{kind} failed"),
        },
    }
}

fn print_artifact(resolved: &ResolvedArtifact) {
    match resolved {
        ResolvedArtifact::Launched { artifact, pid } => {
            println!("launched {} (pid {:?})", artifact.name, pid)
        }
        ResolvedArtifact::Markup { content, .. } => println!("{content}"),
        ResolvedArtifact::TextFile(a)
        | ResolvedArtifact::LogDatabase(a)
        | ResolvedArtifact::Reference(a) => println!("{}", a.path.display()),
    }
}

fn print_list(coordinator: &MultiProjectCoordinator) -> Result<()> {
    let selected = coordinator.selected();
    for id in coordinator.project_ids() {
        let project = coordinator.project(&id)?;
        let marker = if selected.as_ref() == Some(&id) { "*" } else { " " };
        println!("{marker} {id} ({})", project.root().display());
        for task in project.tasks() {
            let state = coordinator.task_state_in(&id, &task.id)?;
            println!("    {:<20} {:<12} {:?}", task.id.as_str(), task.stage.as_str(), state);
        }
    }
    Ok(())
}

/// Simple dry-run output: print projects, tasks and resolved commands.
fn print_dry_run(cfg: &ConfigFile, projects: &[Project]) {
    println!("hdlrun dry-run");
    println!("  config.terminate_grace = {:?}", cfg.config.terminate_grace());
    println!("  config.kill_timeout = {:?}", cfg.config.kill_timeout());
    println!("  config.drain_timeout = {:?}", cfg.config.drain_timeout());
    println!();

    println!("projects ({}):", projects.len());
    for project in projects {
        println!("  - {} ({})", project.id(), project.root().display());
        println!("      build_dir: {}", project.build_dir().display());
        println!("      clean: {}", project.clean_command().display());
        for task in project.tasks() {
            if let Some(cmd) = project.command_for(&task.id) {
                println!("      {} [{}]: {}", task.id, task.stage, cmd.display());
                println!("          cwd: {}", cmd.cwd().display());
            }
        }
        let shells: Vec<_> = project.shells().collect();
        if !shells.is_empty() {
            println!("      consoles: {shells:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
