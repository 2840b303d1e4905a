// src/engine/shutdown.rs

use std::future::Future;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

use crate::batch::BatchSummary;

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Draining,
    Stopped,
}

/// What happened during shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Pending timers cancelled when the tracker closed.
    pub abandoned: usize,
    /// Queued files dropped by a forced drain (moved back to their origin).
    pub discarded: usize,
    /// Whether the drain deadline expired.
    pub forced: bool,
    /// Files rescued from the staging area into quarantine.
    pub salvaged: usize,
    /// Batcher summary, when batching was enabled.
    pub batches: Option<BatchSummary>,
}

/// One deadline shared by every drain step. Once it passes, the force
/// signal is raised and later steps run to completion unbounded (forced
/// commands are killed, so they finish promptly).
#[derive(Debug)]
pub struct DrainBudget {
    deadline: Instant,
    force: watch::Sender<bool>,
    forced: bool,
}

impl DrainBudget {
    pub fn new(deadline: Instant, force: watch::Sender<bool>) -> Self {
        Self {
            deadline,
            force,
            forced: false,
        }
    }

    pub fn forced(&self) -> bool {
        self.forced
    }

    /// Await `fut`, forcing the drain if the deadline passes first.
    pub async fn run<F: Future>(&mut self, step: &'static str, fut: F) -> F::Output {
        tokio::pin!(fut);

        if !self.forced {
            match tokio::time::timeout_at(self.deadline, fut.as_mut()).await {
                Ok(output) => return output,
                Err(_) => {
                    warn!(step, "drain deadline reached; forcing shutdown");
                    self.force();
                }
            }
        }

        fut.await
    }

    pub fn force(&mut self) {
        self.forced = true;
        self.force.send_replace(true);
    }
}
