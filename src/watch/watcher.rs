// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::Event;
use regex::Regex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::engine::DebounceTracker;
use crate::errors::{Result, SettledError};

use super::classifier::{classify, is_excluded, operations, Classification, Operation};
use super::source::{NotifySource, RawEvents, WatchSource};

/// Consumes filesystem events, keeps directory registrations in sync with
/// the tree, and reports file activity to the debounce tracker.
#[derive(Debug)]
pub struct EventLoop<S> {
    root: PathBuf,
    source: S,
    tracker: DebounceTracker,
    exclude: Option<Regex>,
    registered: BTreeSet<PathBuf>,
}

impl<S: WatchSource> EventLoop<S> {
    pub fn new(
        root: impl Into<PathBuf>,
        source: S,
        tracker: DebounceTracker,
        exclude: Option<Regex>,
    ) -> Self {
        Self {
            root: root.into(),
            source,
            tracker,
            exclude,
            registered: BTreeSet::new(),
        }
    }

    /// Register every directory below the root and start a timer for every
    /// file already present.
    pub fn populate(&mut self) -> Result<()> {
        let root = self.root.clone();
        self.register_tree(&root)?;
        info!(
            dir = ?root,
            directories = self.registered.len(),
            files = self.tracker.len(),
            "watching directory for changes"
        );
        Ok(())
    }

    pub fn is_registered(&self, dir: &Path) -> bool {
        self.registered.contains(dir)
    }

    pub fn registered_dirs(&self) -> impl Iterator<Item = &Path> {
        self.registered.iter().map(PathBuf::as_path)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Apply one raw notify event.
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        trace!(kind = ?event.kind, paths = ?event.paths, "notify event");
        for (path, op) in operations(&event.kind, &event.paths, Path::exists) {
            self.handle(&path, op)?;
        }
        Ok(())
    }

    /// Apply one operation on one path. Only registration failures are
    /// returned as errors.
    pub fn handle(&mut self, path: &Path, op: Operation) -> Result<()> {
        // Symlinks are never followed: a link to a directory is a file here,
        // the same as during the startup walk.
        let is_dir = std::fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
            || self.registered.contains(path);

        match classify(path, op, is_dir, self.exclude.as_ref()) {
            Classification::Ignored => {}
            Classification::RegisterTree(dir) => self.register_tree(&dir)?,
            Classification::UnregisterTree(dir) => self.unregister_tree(&dir)?,
            Classification::Activity(file) => self.tracker.on_activity(&file),
            Classification::Removal(file) => self.tracker.on_removal(&file),
        }
        Ok(())
    }

    /// Walk `dir`: register every directory, report every file as created.
    /// Excluded entries are skipped and excluded directories not descended.
    fn register_tree(&mut self, dir: &Path) -> Result<()> {
        let exclude = self.exclude.clone();
        let walker = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.path(), exclude.as_ref()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(?dir, error = %err, "failed to walk directory");
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_dir() {
                self.register_dir(path)?;
            } else {
                self.tracker.on_activity(path);
            }
        }
        Ok(())
    }

    fn register_dir(&mut self, dir: &Path) -> Result<()> {
        if self.registered.contains(dir) {
            return Ok(());
        }

        match self.source.register(dir) {
            Ok(()) => {
                debug!(?dir, "watching directory");
                self.registered.insert(dir.to_path_buf());
                Ok(())
            }
            Err(err) if !dir.exists() => {
                debug!(?dir, error = %err, "directory vanished before it could be watched");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Unregister `dir` and every registered directory below it, and forget
    /// pending files under it.
    fn unregister_tree(&mut self, dir: &Path) -> Result<()> {
        let below: Vec<PathBuf> = self
            .registered
            .range(dir.to_path_buf()..)
            .take_while(|d| d.starts_with(dir))
            .cloned()
            .collect();

        for sub in below.iter().rev() {
            self.source.unregister(sub)?;
            self.registered.remove(sub);
            debug!(dir = ?sub, "stopped watching directory");
        }

        self.tracker.forget_under(dir);
        Ok(())
    }

    /// Process events until `stop` fires or the event stream ends. Returns
    /// an error on a registration failure.
    pub async fn run(mut self, mut events: RawEvents, mut stop: oneshot::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!("watcher stop requested");
                    return Ok(());
                }
                next = events.recv() => match next {
                    Some(Ok(event)) => self.handle_event(event)?,
                    Some(Err(err)) => error!(error = %err, "error with watcher"),
                    None => {
                        return Err(SettledError::Other(anyhow::anyhow!(
                            "filesystem event stream ended unexpectedly"
                        )));
                    }
                },
            }
        }
    }
}

/// Handle to the running event loop. Dropping it without calling
/// [`WatcherHandle::stop`] also stops the loop.
#[derive(Debug)]
pub struct WatcherHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl WatcherHandle {
    /// Run `event_loop` on its own task.
    pub fn spawn<S>(event_loop: EventLoop<S>, events: RawEvents) -> Self
    where
        S: WatchSource + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(event_loop.run(events, stop_rx));
        Self {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Resolves only if the event loop ends on its own, which means it
    /// failed. Safe to use in `select!`.
    pub async fn closed(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let result = join_result(task.await);
        self.task = None;
        result
    }

    /// Stop the event loop (dropping the watch source) and wait for it.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => join_result(task.await),
            None => Ok(()),
        }
    }
}

fn join_result(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|err| SettledError::Other(anyhow::anyhow!("watcher task failed: {err}")))?
}

/// Watch `settings.watch_dir` with the platform watcher: register the tree,
/// seed the tracker with existing files, and start the event loop.
///
/// Fails if any directory cannot be registered.
pub fn spawn_watcher(settings: &Settings, tracker: DebounceTracker) -> Result<WatcherHandle> {
    let (source, events) = NotifySource::new()?;
    let mut event_loop = EventLoop::new(
        settings.watch_dir.clone(),
        source,
        tracker,
        settings.exclude.clone(),
    );
    event_loop.populate()?;
    Ok(WatcherHandle::spawn(event_loop, events))
}
