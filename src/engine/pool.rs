// src/engine/pool.rs

//! Fixed-size worker pool consuming the dispatch queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::exec::{forced, Dispatcher, ForceSignal};
use crate::fs::StagedFile;

/// Receiving side of the dispatch queue, shared by every worker.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<StagedFile>>>;

/// Where workers send the files they take off the queue.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Run the command on each file.
    Dispatch(Arc<Dispatcher>),
    /// Forward to the archive batcher.
    Batch(mpsc::Sender<StagedFile>),
}

#[derive(Debug)]
pub struct WorkerPool {
    workers: JoinSet<()>,
    queue: SharedQueue,
}

impl WorkerPool {
    /// Spawn `count` workers sharing `queue`.
    pub fn spawn(
        count: usize,
        queue: mpsc::Receiver<StagedFile>,
        sink: Sink,
        force: ForceSignal,
    ) -> Self {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        let mut workers = JoinSet::new();

        for id in 0..count {
            workers.spawn(worker(id, Arc::clone(&queue), sink.clone(), force.clone()));
        }

        info!(workers = count, "worker pool started");
        Self { workers, queue }
    }

    pub fn queue(&self) -> SharedQueue {
        Arc::clone(&self.queue)
    }

    /// Wait for every worker to exit.
    pub async fn join(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "worker task failed");
            }
        }
    }
}

/// Take items until the queue is closed and drained, or the drain is
/// forced. Exactly one worker receives each item.
async fn worker(id: usize, queue: SharedQueue, sink: Sink, mut force: ForceSignal) {
    debug!(worker = id, "worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = forced(&mut force) => {
                debug!(worker = id, "drain forced; worker stopping");
                break;
            }
            next = async { queue.lock().await.recv().await } => next,
        };

        let Some(file) = next else {
            break;
        };

        match &sink {
            Sink::Dispatch(dispatcher) => {
                dispatcher.dispatch_file(file).await;
            }
            Sink::Batch(batcher) => {
                if let Err(mpsc::error::SendError(file)) = batcher.send(file).await {
                    // Left in the staging area; salvaged into quarantine on shutdown.
                    error!(worker = id, file = ?file.original, "batcher is gone; file left staged");
                }
            }
        }
    }

    debug!(worker = id, "worker exited");
}
