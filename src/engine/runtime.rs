// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchSummary, Batcher, BATCH_CHANNEL_CAPACITY};
use crate::config::Settings;
use crate::errors::Result;
use crate::exec::{CommandRunner, Dispatcher};
use crate::fs::{offload, FileSystem, StagedFile, StagingArea};

use super::pool::{Sink, WorkerPool};
use super::shutdown::{DrainBudget, EngineState, ShutdownReport};
use super::tracker::DebounceTracker;

/// The running pipeline: debounce tracker, dispatch queue, worker pool and
/// (optionally) the archive batcher.
///
/// Feed it through [`Engine::tracker`]; stop it with [`Engine::shutdown`].
pub struct Engine {
    tracker: DebounceTracker,
    staging: StagingArea,
    pool: WorkerPool,
    batcher: Option<JoinHandle<BatchSummary>>,
    force: watch::Sender<bool>,
    state: watch::Sender<EngineState>,
    drain_timeout: Duration,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("staging", &self.staging)
            .field("state", &*self.state.borrow())
            .field("batching", &self.batcher.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create the staging area and spawn the workers (and batcher).
    pub async fn start(
        settings: &Settings,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let staging = StagingArea::from_settings(settings, fs);
        {
            let staging = staging.clone();
            offload(move || staging.init()).await?;
        }

        let (force_tx, force_rx) = watch::channel(false);
        let dispatcher = Arc::new(Dispatcher::new(
            settings.command.clone(),
            runner,
            staging.clone(),
            force_rx.clone(),
        ));

        let (queue_tx, queue_rx) = mpsc::channel::<StagedFile>(settings.transfers);

        let (sink, batcher) = if settings.batching_enabled() {
            let (batch_tx, batch_rx) = mpsc::channel::<StagedFile>(BATCH_CHANNEL_CAPACITY);
            let batcher = Batcher::new(Arc::clone(&dispatcher), settings.batch_threshold);
            (Sink::Batch(batch_tx), Some(tokio::spawn(batcher.run(batch_rx))))
        } else {
            (Sink::Dispatch(dispatcher), None)
        };

        let pool = WorkerPool::spawn(settings.transfers, queue_rx, sink, force_rx);
        let tracker = DebounceTracker::new(settings.inactive_delay, staging.clone(), queue_tx);

        let (state, _) = watch::channel(EngineState::Running);

        info!(
            watch_dir = ?settings.watch_dir,
            staging_dir = ?staging.staging_dir(),
            wait = ?settings.inactive_delay,
            transfers = settings.transfers,
            batch_threshold = settings.batch_threshold,
            "engine started"
        );

        Ok(Self {
            tracker,
            staging,
            pool,
            batcher,
            force: force_tx,
            state,
            drain_timeout: settings.drain_timeout,
        })
    }

    /// Handle used by the watcher to report file activity.
    pub fn tracker(&self) -> DebounceTracker {
        self.tracker.clone()
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Observe state transitions (`Running -> Draining -> Stopped`).
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Drain and stop.
    ///
    /// 1. Close the tracker: pending timers are cancelled, files stay put.
    /// 2. Let the workers empty the queue, bounded by the drain timeout.
    ///    If the deadline passes the drain is forced: running commands are
    ///    killed and whatever is still queued is moved back.
    /// 3. Wait for in-flight hand-offs and the batcher's final flush.
    /// 4. Salvage leftovers into quarantine and remove the staging area.
    pub async fn shutdown(self) -> Result<ShutdownReport> {
        let Engine {
            tracker,
            staging,
            mut pool,
            batcher,
            force,
            state,
            drain_timeout,
        } = self;

        state.send_replace(EngineState::Draining);
        let mut budget = DrainBudget::new(Instant::now() + drain_timeout, force);

        let closed = tracker.close();
        info!(
            abandoned = closed.abandoned,
            in_flight = closed.in_flight.len(),
            "draining: tracker closed"
        );

        budget.run("workers", pool.join()).await;

        let leftovers = close_queue(&pool).await;
        let discarded = leftovers.len();
        if discarded > 0 {
            warn!(discarded, "drain forced; moving queued files back");
            for file in leftovers {
                let staging = staging.clone();
                let original = file.original.clone();
                if let Err(err) = offload(move || staging.revert(&file)).await {
                    error!(file = ?original, error = %err, "failed to move queued file back");
                }
            }
        }

        for handle in closed.in_flight {
            if let Err(err) = budget.run("hand-offs", handle).await {
                error!(error = %err, "hand-off task failed");
            }
        }

        let batches = match batcher {
            Some(handle) => match budget.run("batcher", handle).await {
                Ok(summary) => Some(summary),
                Err(err) => {
                    error!(error = %err, "batcher task failed");
                    None
                }
            },
            None => None,
        };

        let salvaged = {
            let staging = staging.clone();
            offload(move || {
                let salvaged = staging.salvage()?;
                staging.cleanup()?;
                Ok(salvaged)
            })
            .await?
        };
        debug!(dir = ?staging.staging_dir(), "staging dir removed");

        state.send_replace(EngineState::Stopped);

        let report = ShutdownReport {
            abandoned: closed.abandoned,
            discarded,
            forced: budget.forced(),
            salvaged,
            batches,
        };
        info!(?report, "engine stopped");
        Ok(report)
    }
}

/// Close the dispatch queue and take anything still buffered in it.
async fn close_queue(pool: &WorkerPool) -> Vec<StagedFile> {
    let queue = pool.queue();
    let mut rx = queue.lock().await;
    rx.close();

    let mut leftovers = Vec::new();
    while let Ok(file) = rx.try_recv() {
        leftovers.push(file);
    }
    leftovers
}
