// src/exec/dispatcher.rs

//! Runs the command template against staged files and archives, then
//! disposes of the input according to the outcome:
//!
//! | input   | success | failure                    |
//! |---------|---------|----------------------------|
//! | file    | delete  | move back to original path |
//! | archive | delete  | move to quarantine         |

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::fs::{offload, StagedFile, StagingArea};

use super::backend::{CommandOutcome, CommandRunner, ForceSignal};
use super::template::{CommandTemplate, Invocation, Placeholders};

#[derive(Debug)]
pub struct Dispatcher {
    template: CommandTemplate,
    runner: Arc<dyn CommandRunner>,
    staging: StagingArea,
    force: ForceSignal,
}

impl Dispatcher {
    pub fn new(
        template: CommandTemplate,
        runner: Arc<dyn CommandRunner>,
        staging: StagingArea,
        force: ForceSignal,
    ) -> Self {
        Self {
            template,
            runner,
            staging,
            force,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Invocation for a single staged file.
    pub fn invocation_for_file(&self, file: &StagedFile) -> Invocation {
        let dir = self.staging.relative_dir(&file.original);
        let name = file_name(&file.original);
        self.template.render(&Placeholders {
            file: &file.staged,
            dir: &dir,
            name: &name,
        })
    }

    /// Invocation for a finished archive; `%dir` is always empty.
    pub fn invocation_for_archive(&self, archive: &Path) -> Invocation {
        let name = file_name(archive);
        self.template.render(&Placeholders {
            file: archive,
            dir: "",
            name: &name,
        })
    }

    /// Dispatch one staged file. Returns the command outcome after the file
    /// has been discarded (success) or reverted (failure).
    pub async fn dispatch_file(&self, file: StagedFile) -> CommandOutcome {
        let invocation = self.invocation_for_file(&file);
        info!(file = ?file.original, command = %invocation, "dispatching file");

        let outcome = self.runner.run(invocation, self.force.clone()).await;

        let staging = self.staging.clone();
        if outcome.is_success() {
            let staged = file.staged.clone();
            if let Err(err) = offload(move || staging.discard(&staged)).await {
                warn!(file = ?file.staged, error = %err, "failed to delete dispatched file");
            }
            info!(file = ?file.original, "file dispatched");
        } else {
            let original = file.original.clone();
            match offload(move || staging.revert(&file)).await {
                Ok(dest) => warn!(file = ?original, to = ?dest, ?outcome, "dispatch failed; file moved back"),
                Err(err) => error!(file = ?original, error = %err, ?outcome, "dispatch failed and file could not be moved back"),
            }
        }

        outcome
    }

    /// Dispatch one finished archive. On failure the archive is quarantined.
    pub async fn dispatch_archive(&self, archive: &Path) -> CommandOutcome {
        let invocation = self.invocation_for_archive(archive);
        info!(archive = ?archive, command = %invocation, "dispatching archive");

        let outcome = self.runner.run(invocation, self.force.clone()).await;

        let staging = self.staging.clone();
        let path = archive.to_path_buf();
        if outcome.is_success() {
            if let Err(err) = offload(move || staging.discard(&path)).await {
                warn!(archive = ?archive, error = %err, "failed to delete dispatched archive");
            }
            info!(archive = ?archive, "archive dispatched");
        } else {
            match offload(move || staging.quarantine(&path)).await {
                Ok(dest) => warn!(archive = ?archive, to = ?dest, ?outcome, "archive dispatch failed; quarantined"),
                Err(err) => error!(archive = ?archive, error = %err, ?outcome, "archive dispatch failed and could not be quarantined"),
            }
        }

        outcome
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
