// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every setting is optional here so that values from `--config` can fill
//! the gaps; [`crate::config::loader::load_settings`] merges both sources and
//! validates the result.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `settled`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "settled",
    version,
    about = "Run a command on each file once it has stopped changing.",
    long_about = None
)]
pub struct CliArgs {
    /// DIRECTORY to watch.
    #[arg(short = 'd', long, value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Executed for every settled file. You can use %file, %name and %dir.
    ///
    /// Example: "rclone move %file remote:/incoming/%dir"
    #[arg(short = 'c', long, value_name = "TEMPLATE")]
    pub command: Option<String>,

    /// Files are dispatched after DELAY of inactivity (e.g. "10s", "500ms").
    #[arg(short = 'w', long, value_name = "DELAY", value_parser = humantime::parse_duration)]
    pub wait: Option<Duration>,

    /// Number of simultaneous transfers.
    #[arg(short = 't', long, value_name = "N")]
    pub transfers: Option<usize>,

    /// Exclude paths that match this regex pattern.
    #[arg(short = 'e', long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Fill a .tar file with up to NUMBER files before running the command.
    ///
    /// Set to 1 (the default) to dispatch every file individually.
    #[arg(long = "tar", value_name = "NUMBER")]
    pub tar: Option<usize>,

    /// Parent of the private directory (`settled-<pid>`) that holds files
    /// while they are being dispatched.
    #[arg(long, value_name = "PATH")]
    pub staging_dir: Option<PathBuf>,

    /// Optional TOML file providing defaults for the flags above.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SETTLED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the configuration, print it, and exit without watching.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
