// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`template`] tokenizes the command template and renders invocations.
//! - [`backend`] provides the `CommandRunner` trait and the production
//!   `ProcessRunner`; tests replace it with a fake implementation.
//! - [`runner`] runs a single OS process.
//! - [`dispatcher`] applies the template to staged files and archives and
//!   disposes of them according to the outcome.

pub mod backend;
pub mod dispatcher;
pub mod runner;
pub mod template;

pub use backend::{forced, CommandOutcome, CommandRunner, ForceSignal, ProcessRunner};
pub use dispatcher::Dispatcher;
pub use template::{CommandTemplate, Invocation, Placeholders};
