// src/engine/mod.rs

//! Dispatch engine.
//!
//! - [`tracker`] decides when a file has settled and hands it off.
//! - [`pool`] runs the workers consuming the dispatch queue.
//! - [`shutdown`] holds the drain bookkeeping.
//! - [`runtime`] wires everything into an [`Engine`].

pub mod pool;
pub mod runtime;
pub mod shutdown;
pub mod tracker;

pub use pool::{Sink, WorkerPool};
pub use runtime::Engine;
pub use shutdown::{DrainBudget, EngineState, ShutdownReport};
pub use tracker::{ClosedTracker, DebounceTracker};
