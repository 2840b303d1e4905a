// src/watch/source.rs

use std::path::Path;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{Result, SettledError};

/// Raw events as delivered by the notify callback.
pub type RawEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Per-directory watch registration.
///
/// Each registered directory is watched non-recursively; the event loop
/// registers subdirectories itself.
pub trait WatchSource: Send {
    fn register(&mut self, dir: &Path) -> Result<()>;

    /// Unregistering a directory that is no longer watched is not an error.
    fn unregister(&mut self, dir: &Path) -> Result<()>;
}

/// [`WatchSource`] backed by the platform's `notify` watcher.
pub struct NotifySource {
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource").finish()
    }
}

impl NotifySource {
    /// Create the watcher and the channel its callback feeds.
    pub fn new() -> Result<(Self, RawEvents)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only once the event loop has stopped.
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|source| SettledError::WatchError {
            action: "create",
            path: std::path::PathBuf::new(),
            source,
        })?;

        Ok((Self { watcher }, rx))
    }
}

impl WatchSource for NotifySource {
    fn register(&mut self, dir: &Path) -> Result<()> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| SettledError::WatchError {
                action: "add",
                path: dir.to_path_buf(),
                source,
            })
    }

    fn unregister(&mut self, dir: &Path) -> Result<()> {
        match self.watcher.unwatch(dir) {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind, notify::ErrorKind::WatchNotFound) || !dir.exists() => {
                debug!(?dir, error = %err, "watch already gone");
                Ok(())
            }
            Err(source) => Err(SettledError::WatchError {
                action: "remove",
                path: dir.to_path_buf(),
                source,
            }),
        }
    }
}
