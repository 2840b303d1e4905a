// src/engine/tracker.rs

//! Per-path inactivity timers.
//!
//! Every path with recent write activity owns one timer task. Activity
//! restarts the timer; when it fires, the file is *locked* (committed to
//! dispatch), moved into the staging area and pushed onto the dispatch
//! queue. All bookkeeping happens under a single mutex so that a reset, a
//! removal and a firing timer can never interleave on the same path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::fs::{offload, StagedFile, StagingArea};

#[derive(Debug)]
struct TrackedFile {
    /// Identifies the live timer; a firing timer with another generation is
    /// stale.
    generation: u64,
    /// Set when the timer fired; the entry no longer accepts resets.
    locked: bool,
    timer: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct TrackerState {
    files: HashMap<PathBuf, TrackedFile>,
    next_generation: u64,
    /// `None` once the tracker is closed.
    queue: Option<mpsc::Sender<StagedFile>>,
    /// Hand-offs whose entry was removed while locked.
    detached: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
struct Inner {
    delay: Duration,
    staging: StagingArea,
    state: Mutex<TrackerState>,
}

/// Result of closing the tracker.
#[derive(Debug, Default)]
pub struct ClosedTracker {
    /// Pending timers cancelled; their files stay in the watch tree.
    pub abandoned: usize,
    /// Hand-offs already committed to dispatch, still staging or enqueueing.
    pub in_flight: Vec<JoinHandle<()>>,
}

/// Cheaply cloneable handle to the debounce state.
#[derive(Debug, Clone)]
pub struct DebounceTracker {
    inner: Arc<Inner>,
}

impl DebounceTracker {
    pub fn new(delay: Duration, staging: StagingArea, queue: mpsc::Sender<StagedFile>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                staging,
                state: Mutex::new(TrackerState {
                    queue: Some(queue),
                    ..TrackerState::default()
                }),
            }),
        }
    }

    /// Write or create activity on `path`: start or restart its timer.
    pub fn on_activity(&self, path: &Path) {
        let mut state = self.inner.lock();
        if state.queue.is_none() {
            trace!(?path, "tracker closed; ignoring activity");
            return;
        }

        if let Some(entry) = state.files.get(path) {
            if entry.locked {
                trace!(?path, "file already committed to dispatch; ignoring activity");
                return;
            }
            entry.timer.abort();
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let timer = self.inner.spawn_timer(path.to_path_buf(), generation);
        let restarted = state
            .files
            .insert(
                path.to_path_buf(),
                TrackedFile {
                    generation,
                    locked: false,
                    timer,
                },
            )
            .is_some();

        trace!(?path, generation, restarted, "inactivity timer armed");
    }

    /// Remove or rename of `path`: forget it. A pending timer is cancelled;
    /// a locked hand-off keeps running.
    pub fn on_removal(&self, path: &Path) {
        let mut state = self.inner.lock();
        let Some(entry) = state.files.remove(path) else {
            return;
        };

        if entry.locked {
            debug!(?path, "file removed while being handed off");
            state.detached.retain(|h| !h.is_finished());
            state.detached.push(entry.timer);
        } else {
            entry.timer.abort();
            trace!(?path, "pending timer cancelled by removal");
        }
    }

    /// Cancel every pending timer below `dir`. Returns how many were dropped.
    pub fn forget_under(&self, dir: &Path) -> usize {
        let mut state = self.inner.lock();
        let mut forgotten = 0;
        state.files.retain(|path, entry| {
            if entry.locked || !path.starts_with(dir) {
                return true;
            }
            entry.timer.abort();
            forgotten += 1;
            false
        });
        if forgotten > 0 {
            debug!(?dir, forgotten, "forgot files below removed directory");
        }
        forgotten
    }

    /// Stop accepting work. Pending timers are cancelled and their files left
    /// in place; hand-offs that already fired are returned for the caller to
    /// await. Closing twice is harmless.
    pub fn close(&self) -> ClosedTracker {
        let mut state = self.inner.lock();
        state.queue = None;

        let mut closed = ClosedTracker {
            abandoned: 0,
            in_flight: std::mem::take(&mut state.detached),
        };

        for (path, entry) in state.files.drain() {
            if entry.locked {
                closed.in_flight.push(entry.timer);
            } else {
                entry.timer.abort();
                trace!(?path, "pending timer abandoned");
                closed.abandoned += 1;
            }
        }

        closed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().queue.is_none()
    }

    /// Number of paths currently tracked (pending or locked).
    pub fn len(&self) -> usize {
        self.inner.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.inner.lock().files.contains_key(path)
    }

    /// Whether `path` fired and is committed to dispatch.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.inner.lock().files.get(path).is_some_and(|entry| entry.locked)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn_timer(self: &Arc<Self>, path: PathBuf, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.fire(path, generation).await;
        })
    }

    async fn fire(self: Arc<Self>, path: PathBuf, generation: u64) {
        let queue = {
            let mut state = self.lock();
            let Some(queue) = state.queue.clone() else {
                trace!(?path, "timer fired after close; leaving file in place");
                return;
            };
            match state.files.get_mut(&path) {
                Some(entry) if entry.generation == generation && !entry.locked => {
                    entry.locked = true;
                }
                _ => {
                    trace!(?path, generation, "stale timer");
                    return;
                }
            }
            queue
        };

        let staging = self.staging.clone();
        let original = path.clone();
        let busy = offload(move || Ok(staging.is_busy(&original)))
            .await
            .unwrap_or(false);
        if busy {
            debug!(?path, "previous version still being dispatched; waiting");
            self.rearm(&path, generation);
            return;
        }

        debug!(?path, "file is inactive; staging");
        self.hand_off(&path, queue).await;

        let mut state = self.lock();
        if state
            .files
            .get(&path)
            .is_some_and(|entry| entry.generation == generation)
        {
            state.files.remove(&path);
        }
    }

    /// Unlock the entry fired with `generation` and start a new timer.
    fn rearm(self: &Arc<Self>, path: &Path, generation: u64) {
        let mut state = self.lock();
        let closed = state.queue.is_none();

        let Some(entry) = state.files.get(path) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        if closed {
            state.files.remove(path);
            return;
        }

        state.next_generation += 1;
        let next = state.next_generation;
        let timer = self.spawn_timer(path.to_path_buf(), next);
        state.files.insert(
            path.to_path_buf(),
            TrackedFile {
                generation: next,
                locked: false,
                timer,
            },
        );
    }

    async fn hand_off(&self, path: &Path, queue: mpsc::Sender<StagedFile>) {
        let staging = self.staging.clone();
        let original = path.to_path_buf();
        let staged = match offload(move || staging.stage(&original)).await {
            Ok(staged) => staged,
            Err(err) => {
                error!(?path, error = %err, "failed to stage file");
                return;
            }
        };

        if let Err(mpsc::error::SendError(staged)) = queue.send(staged).await {
            warn!(?path, "dispatch queue closed; moving file back");
            let staging = self.staging.clone();
            if let Err(err) = offload(move || staging.revert(&staged).map(|_| ())).await {
                error!(?path, error = %err, "failed to move file back");
            }
        }
    }
}
