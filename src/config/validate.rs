// src/config/validate.rs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::model::{
    RawConfigFile, Settings, DEFAULT_DRAIN_TIMEOUT, DEFAULT_TAR, DEFAULT_TRANSFERS,
    DEFAULT_WAIT,
};
use crate::errors::{Result, SettledError};
use crate::exec::CommandTemplate;

impl TryFrom<RawConfigFile> for Settings {
    type Error = SettledError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch_dir = validate_watch_dir(raw.directory.as_deref())?;
        let command = validate_command(raw.command.as_deref())?;

        let inactive_delay = raw.wait.unwrap_or(DEFAULT_WAIT);
        if inactive_delay.is_zero() {
            return Err(SettledError::config("wait must be greater than zero"));
        }

        let transfers = raw.transfers.unwrap_or(DEFAULT_TRANSFERS);
        if transfers == 0 {
            return Err(SettledError::config("transfers must be >= 1 (got 0)"));
        }

        let exclude = raw
            .exclude
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    SettledError::config(format!("invalid exclude pattern /{p}/: {e}"))
                })
            })
            .transpose()?;

        // The configured directory is only a parent: settled owns (and
        // removes at shutdown) a private child inside it.
        let staging_parent = match raw.staging_dir {
            Some(dir) => absolutize(&dir)?,
            None => std::env::temp_dir(),
        };
        let staging_dir = staging_parent.join(private_staging_name());
        let quarantine_dir = quarantine_dir_for(&watch_dir);

        validate_layout(&watch_dir, &staging_dir, &quarantine_dir)?;

        Ok(Settings {
            watch_dir,
            command,
            inactive_delay,
            transfers,
            exclude,
            batch_threshold: raw.tar.unwrap_or(DEFAULT_TAR),
            staging_dir,
            quarantine_dir,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }
}

fn validate_watch_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = dir.ok_or_else(|| SettledError::config("directory must be specified"))?;

    let canonical = dir.canonicalize().map_err(|e| {
        SettledError::config(format!("cannot access watch directory {dir:?}: {e}"))
    })?;

    if !canonical.is_dir() {
        return Err(SettledError::config(format!(
            "watch directory {canonical:?} is not a directory"
        )));
    }

    Ok(canonical)
}

fn validate_command(command: Option<&str>) -> Result<CommandTemplate> {
    let command = command
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| SettledError::config("command must be specified"))?;

    CommandTemplate::parse(command)
        .map_err(|e| SettledError::config(format!("invalid command template: {e}")))
}

/// Name of the per-process staging directory created under the configured
/// (or system temp) parent.
pub fn private_staging_name() -> String {
    format!("settled-{}", std::process::id())
}

/// `<watchdir>.fail`, a sibling of the watch directory.
pub fn quarantine_dir_for(watch_dir: &Path) -> PathBuf {
    let mut name = OsString::from(watch_dir.as_os_str());
    name.push(".fail");
    PathBuf::from(name)
}

fn validate_layout(watch_dir: &Path, staging_dir: &Path, quarantine_dir: &Path) -> Result<()> {
    // Staging inside the watch tree would feed staged files back into the
    // watcher; the reverse would let staging cleanup delete the watch tree.
    if staging_dir.starts_with(watch_dir) {
        return Err(SettledError::config(format!(
            "staging directory {staging_dir:?} must not be inside the watch directory {watch_dir:?}"
        )));
    }
    if watch_dir.starts_with(staging_dir) {
        return Err(SettledError::config(format!(
            "watch directory {watch_dir:?} must not be inside the staging directory {staging_dir:?}"
        )));
    }
    if staging_dir.starts_with(quarantine_dir) || quarantine_dir.starts_with(staging_dir) {
        return Err(SettledError::config(format!(
            "staging directory {staging_dir:?} must not be inside the quarantine directory {quarantine_dir:?}"
        )));
    }
    if quarantine_dir.starts_with(watch_dir) {
        return Err(SettledError::config(format!(
            "quarantine directory {quarantine_dir:?} would be inside the watch directory"
        )));
    }
    Ok(())
}

/// Make a possibly non-existent path absolute, resolving symlinks where the
/// path already exists so it compares correctly against the canonical watch
/// directory.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
