// src/engine/prompt.rs

//! Yes/no confirmations requested by the coordinator.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::types::{ProjectId, TaskId};

/// Boxed future returned by [`Confirmer::confirm`].
pub type ConfirmFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Something the coordinator wants the user to agree to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    /// `task` already finished successfully on `project`.
    Rerun { project: ProjectId, task: TaskId },
    /// Remove everything the toolchain generated for `project`.
    Clean { project: ProjectId },
}

impl ConfirmRequest {
    pub fn message(&self) -> String {
        match self {
            ConfirmRequest::Rerun { task, .. } => format!(
                "{task} has already run successfully. Do you want to run the task again?"
            ),
            ConfirmRequest::Clean { .. } => "Do you want to clean the project? Cleaning \
                 removes the project database and other files generated by the toolchain, \
                 including report and programming files."
                .to_string(),
        }
    }
}

/// Asynchronous yes/no contract. Anything but an explicit yes is a no.
pub trait Confirmer: Send + Sync {
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a>;
}

/// Answers every request the same way (`--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        let answer = self.0;
        Box::pin(async move {
            debug!(?request, answer, "auto-confirm");
            answer
        })
    }
}

/// Interactive prompt on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        let message = request.message();
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                dialoguer::Confirm::new()
                    .with_prompt(message)
                    .default(false)
                    .interact()
            })
            .await;

            match answer {
                Ok(Ok(yes)) => yes,
                Ok(Err(e)) => {
                    warn!(error = %e, "confirmation prompt failed; treating as no");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "confirmation prompt task failed; treating as no");
                    false
                }
            }
        })
    }
}
