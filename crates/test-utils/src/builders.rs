#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use settled::config::{RawConfigFile, Settings};

/// Builder for `Settings` to simplify test setup.
///
/// Goes through `RawConfigFile` and `Settings::try_from`, so every built
/// value passed the same validation as a real configuration.
pub struct SettingsBuilder {
    raw: RawConfigFile,
    drain_timeout: Option<Duration>,
}

impl SettingsBuilder {
    pub fn new(watch_dir: impl Into<PathBuf>, command: &str) -> Self {
        Self {
            raw: RawConfigFile {
                directory: Some(watch_dir.into()),
                command: Some(command.to_string()),
                ..RawConfigFile::default()
            },
            drain_timeout: None,
        }
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.raw.wait = Some(wait);
        self
    }

    pub fn transfers(mut self, transfers: usize) -> Self {
        self.raw.transfers = Some(transfers);
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.raw.exclude = Some(pattern.to_string());
        self
    }

    pub fn tar(mut self, threshold: usize) -> Self {
        self.raw.tar = Some(threshold);
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.staging_dir = Some(dir.into());
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    pub fn try_build(self) -> settled::errors::Result<Settings> {
        let mut settings = Settings::try_from(self.raw)?;
        if let Some(timeout) = self.drain_timeout {
            settings.drain_timeout = timeout;
        }
        Ok(settings)
    }

    pub fn build(self) -> Settings {
        self.try_build()
            .expect("Failed to build valid settings from builder")
    }
}
