// src/batch/batcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::exec::{CommandOutcome, Dispatcher};
use crate::fs::{offload, StagedFile};

use super::archive::ArchiveBatch;

/// What the batcher did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entry count of every flushed archive, in flush order.
    pub flushed: Vec<usize>,
    /// Archives whose command did not succeed.
    pub failed: usize,
}

/// Accumulates staged files into tar archives and dispatches each archive
/// once it holds `threshold` entries.
#[derive(Debug)]
pub struct Batcher {
    dispatcher: Arc<Dispatcher>,
    threshold: usize,
    current: Option<ArchiveBatch>,
    flushes: JoinSet<CommandOutcome>,
    summary: BatchSummary,
}

impl Batcher {
    pub fn new(dispatcher: Arc<Dispatcher>, threshold: usize) -> Self {
        Self {
            dispatcher,
            threshold,
            current: None,
            flushes: JoinSet::new(),
            summary: BatchSummary::default(),
        }
    }

    /// Entries in the archive currently being filled.
    pub fn pending(&self) -> usize {
        self.current.as_ref().map_or(0, ArchiveBatch::entry_count)
    }

    /// Consume staged files until every sender is gone, flush the partial
    /// batch, wait for every archive dispatch and report.
    pub async fn run(mut self, mut rx: mpsc::Receiver<StagedFile>) -> BatchSummary {
        self.current = self.new_batch().await;
        info!(threshold = self.threshold, "batcher started");

        while let Some(file) = rx.recv().await {
            self.append(file).await;
        }

        self.flush_partial().await;
        self.finish().await
    }

    /// Add one staged file to the current archive, flushing when full.
    pub async fn append(&mut self, file: StagedFile) {
        let mut batch = match self.current.take() {
            Some(batch) => batch,
            None => match self.new_batch().await {
                Some(batch) => batch,
                None => {
                    self.revert(file).await;
                    return;
                }
            },
        };

        let staging = self.dispatcher.staging().clone();
        let name = staging
            .relative_path(&file.original)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from(file.original.file_name().unwrap_or_default()));
        let staged = file.staged.clone();

        let appended = tokio::task::spawn_blocking(move || {
            let result = batch.append(&staged, &name);
            (batch, result)
        })
        .await;

        let (batch, result) = match appended {
            Ok(pair) => pair,
            Err(err) => {
                error!(error = %err, "archive append task panicked; batch lost");
                self.revert(file).await;
                return;
            }
        };
        self.current = Some(batch);

        if let Err(err) = result {
            error!(file = ?file.original, error = %err, "failed to append to archive");
            self.revert(file).await;
            return;
        }

        let staged = file.staged.clone();
        if let Err(err) = offload(move || staging.discard(&staged)).await {
            warn!(file = ?file.staged, error = %err, "failed to delete archived file");
        }
        debug!(file = ?file.original, entries = self.pending(), "file archived");

        if self.pending() >= self.threshold {
            self.flush(true).await;
        }
    }

    /// Shutdown only: dispatch the current archive if it holds anything.
    pub async fn flush_partial(&mut self) {
        if self.pending() > 0 {
            info!(entries = self.pending(), "flushing partial batch");
            self.flush(false).await;
            return;
        }

        if let Some(batch) = self.current.take() {
            let staging = self.dispatcher.staging().clone();
            let path = batch.path().to_path_buf();
            drop(batch);
            if let Err(err) = offload(move || staging.discard(&path)).await {
                debug!(error = %err, "failed to delete empty archive");
            }
        }
    }

    /// Finish the current archive and dispatch it in the background.
    /// With `rotate`, a fresh archive is started right away.
    async fn flush(&mut self, rotate: bool) {
        let Some(batch) = self.current.take() else {
            return;
        };
        let entries = batch.entry_count();
        let path = batch.path().to_path_buf();

        match offload(move || batch.finish()).await {
            Ok(archive) => {
                info!(archive = ?archive, entries, partial = !rotate, "dispatching archive");
                self.summary.flushed.push(entries);
                let dispatcher = Arc::clone(&self.dispatcher);
                self.flushes
                    .spawn(async move { dispatcher.dispatch_archive(&archive).await });
            }
            Err(err) => {
                error!(archive = ?path, error = %err, "failed to finish archive; quarantining");
                self.summary.failed += 1;
                let staging = self.dispatcher.staging().clone();
                if let Err(err) = offload(move || staging.quarantine(&path)).await {
                    error!(error = %err, "failed to quarantine unfinished archive");
                }
            }
        }

        if rotate {
            self.current = self.new_batch().await;
        }
    }

    async fn finish(mut self) -> BatchSummary {
        while let Some(joined) = self.flushes.join_next().await {
            match joined {
                Ok(outcome) if outcome.is_success() => {}
                Ok(_) => self.summary.failed += 1,
                Err(err) => {
                    error!(error = %err, "archive dispatch task failed");
                    self.summary.failed += 1;
                }
            }
        }
        info!(
            batches = self.summary.flushed.len(),
            failed = self.summary.failed,
            "batcher stopped"
        );
        self.summary
    }

    /// A `None` result is retried on the next append.
    async fn new_batch(&self) -> Option<ArchiveBatch> {
        let dir = self.dispatcher.staging().batches_dir();
        match offload(move || ArchiveBatch::create(&dir)).await {
            Ok(batch) => {
                debug!(archive = ?batch.path(), "started new batch");
                Some(batch)
            }
            Err(err) => {
                error!(error = %err, "failed to create archive");
                None
            }
        }
    }

    async fn revert(&self, file: StagedFile) {
        let staging = self.dispatcher.staging().clone();
        let original = file.original.clone();
        match offload(move || staging.revert(&file)).await {
            Ok(dest) => warn!(file = ?original, to = ?dest, "file moved back after archive failure"),
            Err(err) => error!(file = ?original, error = %err, "failed to move file back"),
        }
    }
}
