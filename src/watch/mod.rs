// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Mapping `notify` events onto create/write/remove/rename operations and
//!   classifying them (directory vs. file, excluded or not).
//! - Keeping one non-recursive watch per directory in the tree, including
//!   directories created or removed at runtime.
//! - Reporting file activity and removals to the debounce tracker.
//!
//! It does **not** decide when a file has settled; that is the tracker's
//! job.

pub mod classifier;
pub mod source;
pub mod watcher;

pub use classifier::{classify, operations, Classification, Operation};
pub use source::{NotifySource, RawEvents, WatchSource};
pub use watcher::{spawn_watcher, EventLoop, WatcherHandle};
