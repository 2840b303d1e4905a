// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::cli::CliArgs;
use crate::exec::CommandTemplate;

/// Inactivity delay used when neither the CLI nor the config file sets one.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);

/// Number of workers (and dispatch queue capacity) by default.
pub const DEFAULT_TRANSFERS: usize = 10;

/// Batch threshold by default; values <= 1 disable batching.
pub const DEFAULT_TAR: usize = 1;

/// Upper bound on the shutdown drain before it is forced.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration as read from an optional TOML file, before validation.
///
/// ```toml
/// directory = "/data/incoming"
/// command = "rclone move %file remote:/incoming/%dir"
/// wait = "30s"
/// transfers = 4
/// exclude = "\\.part$"
/// tar = 50
/// staging_dir = "/var/tmp/settled"
/// ```
///
/// Every key is optional; CLI flags take precedence over the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub command: Option<String>,

    /// Duration string such as `"10s"` or `"1m 30s"`.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub wait: Option<Duration>,

    #[serde(default)]
    pub transfers: Option<usize>,

    #[serde(default)]
    pub exclude: Option<String>,

    #[serde(default)]
    pub tar: Option<usize>,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl RawConfigFile {
    /// Overlay values given on the command line.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.directory {
            self.directory = Some(dir.clone());
        }
        if let Some(cmd) = &args.command {
            self.command = Some(cmd.clone());
        }
        if let Some(wait) = args.wait {
            self.wait = Some(wait);
        }
        if let Some(transfers) = args.transfers {
            self.transfers = Some(transfers);
        }
        if let Some(exclude) = &args.exclude {
            self.exclude = Some(exclude.clone());
        }
        if let Some(tar) = args.tar {
            self.tar = Some(tar);
        }
        if let Some(staging) = &args.staging_dir {
            self.staging_dir = Some(staging.clone());
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Validated runtime settings.
///
/// Construct via `Settings::try_from(RawConfigFile)` so that every path is
/// absolute and every invariant below holds:
///
/// - `watch_dir` is canonical and exists.
/// - `staging_dir` is a private `settled-<pid>` child of the configured
///   directory (or of the system temp dir).
/// - `staging_dir` and `quarantine_dir` are outside `watch_dir`, do not
///   overlap each other, and `watch_dir` is not inside `staging_dir`.
/// - `transfers >= 1` and `inactive_delay > 0`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub watch_dir: PathBuf,
    pub command: CommandTemplate,
    pub inactive_delay: Duration,
    pub transfers: usize,
    pub exclude: Option<Regex>,
    pub batch_threshold: usize,
    pub staging_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub drain_timeout: Duration,
}

impl Settings {
    /// Batching is only active for thresholds above one.
    pub fn batching_enabled(&self) -> bool {
        self.batch_threshold > 1
    }
}
