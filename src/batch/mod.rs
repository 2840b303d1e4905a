// src/batch/mod.rs

//! Optional archive batching.
//!
//! With a batch threshold above one, workers hand staged files to a single
//! [`Batcher`] task instead of running the command on each. The batcher
//! appends them to a tar archive in the staging area and dispatches the
//! archive once it is full. The last, partial archive is dispatched on
//! shutdown.

pub mod archive;
pub mod batcher;

pub use archive::ArchiveBatch;
pub use batcher::{BatchSummary, Batcher};

/// Capacity of the channel between the workers and the batcher.
pub const BATCH_CHANNEL_CAPACITY: usize = 100;
