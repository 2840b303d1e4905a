// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettledError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to {action} watch on {path:?}: {source}")]
    WatchError {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SettledError {
    pub fn config(msg: impl Into<String>) -> Self {
        SettledError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SettledError>;
