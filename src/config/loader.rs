// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{RawConfigFile, Settings};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; semantic validation happens in
/// `Settings::try_from`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Resolve the effective settings for a run.
///
/// - Reads `--config` if given.
/// - Overlays the CLI flags.
/// - Applies defaults and validates (directory exists, command parses,
///   exclusion regex compiles, staging/quarantine layout is sane).
pub fn load_settings(args: &CliArgs) -> Result<Settings> {
    let mut raw = match &args.config {
        Some(path) => {
            debug!(?path, "loading config file");
            load_from_path(path)?
        }
        None => RawConfigFile::default(),
    };

    raw.apply_cli(args);
    Settings::try_from(raw)
}
