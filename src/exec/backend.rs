// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! The dispatcher talks to a `CommandRunner` instead of spawning processes
//! itself. Production uses [`ProcessRunner`]; tests swap in a fake that
//! records invocations and returns scripted outcomes without spawning
//! anything.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;

use super::runner::run_process;
use super::template::Invocation;

/// Flips to `true` when the shutdown drain is forced. Running commands
/// observe it and abort.
pub type ForceSignal = watch::Receiver<bool>;

/// Resolves once the drain has been forced. Never resolves if the sender is
/// gone without forcing.
pub async fn forced(signal: &mut ForceSignal) {
    if signal.wait_for(|forced| *forced).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Outcome of a single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// Non-zero exit; `-1` when the process was killed by a signal.
    Failed(i32),
    /// The program could not be started.
    LaunchFailed(String),
    /// Killed because the shutdown drain was forced.
    Cancelled,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Trait abstracting how an invocation is executed.
pub trait CommandRunner: Send + Sync + Debug {
    /// Run `invocation` to completion, or until `force` fires.
    fn run(
        &self,
        invocation: Invocation,
        force: ForceSignal,
    ) -> Pin<Box<dyn Future<Output = CommandOutcome> + Send + '_>>;
}

/// Real runner used in production: spawns OS processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        invocation: Invocation,
        force: ForceSignal,
    ) -> Pin<Box<dyn Future<Output = CommandOutcome> + Send + '_>> {
        Box::pin(run_process(invocation, force))
    }
}
