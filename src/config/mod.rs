// src/config/mod.rs

//! Configuration: optional TOML file, CLI overlay, validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_settings};
pub use model::{
    RawConfigFile, Settings, DEFAULT_DRAIN_TIMEOUT, DEFAULT_TAR, DEFAULT_TRANSFERS,
    DEFAULT_WAIT,
};
pub use validate::{private_staging_name, quarantine_dir_for};
