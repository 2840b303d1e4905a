// src/logging.rs

//! Logging setup for `settled` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen in this order:
//! 1. `--log-level` (applies to `settled` only; dependencies stay at `warn`)
//! 2. `SETTLED_LOG`, in `EnvFilter` directive syntax
//!    (e.g. `"debug"`, `"settled::engine=trace,notify=debug"`)
//! 3. `info`
//!
//! Logs go to STDERR. Dispatched command output is captured and logged, so
//! nothing else writes to stdout except `--dry-run`.

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "SETTLED_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        let directives = format!("warn,settled={}", level_filter(level));
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("building log filter {directives:?}"));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value {directives:?}")),
        None => Ok(EnvFilter::new("info")),
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn env_directives_are_used_verbatim() {
        let filter = build_filter(None, Some(" settled::engine=debug ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn defaults_to_info() {
        assert_eq!(build_filter(None, None).unwrap().max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(build_filter(None, Some("  ")).unwrap().max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn garbage_env_value_is_an_error() {
        assert!(build_filter(None, Some("settled=loud")).is_err());
    }
}
