// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod watch;

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{load_settings, Settings};
use crate::engine::{Engine, ShutdownReport};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings (config file + CLI flags)
/// - the engine (tracker, worker pool, batcher)
/// - the filesystem watcher
/// - SIGINT / SIGTERM handling and the shutdown drain
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_settings(&args)?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    serve(
        &settings,
        Arc::new(ProcessRunner::new()),
        Arc::new(RealFileSystem),
        shutdown_signal(),
    )
    .await
    .map(|_| ())
}

/// Watch until `shutdown` resolves or the watcher fails, then drain.
///
/// The drain runs on every path out of the watch loop, including a
/// `shutdown` future that resolves to an error; that error is returned
/// once the engine has stopped.
pub async fn serve<F>(
    settings: &Settings,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    shutdown: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = Result<()>>,
{
    let engine = Engine::start(settings, runner, fs).await?;

    let mut watcher = match watch::spawn_watcher(settings, engine.tracker()) {
        Ok(watcher) => watcher,
        Err(err) => {
            error!(error = %err, "failed to start watching; shutting down");
            engine.shutdown().await?;
            return Err(err.into());
        }
    };

    let watch_result: Result<()> = tokio::select! {
        signal = shutdown => {
            let stopped = watcher.stop().await.map_err(anyhow::Error::from);
            signal.and(stopped)
        }
        failure = watcher.closed() => match failure {
            Ok(()) => Err(anyhow!("watcher stopped unexpectedly")),
            Err(err) => Err(err.into()),
        },
    };

    if let Err(err) = &watch_result {
        error!(error = %err, "watch loop ended with an error; draining");
    }

    let report = engine.shutdown().await?;
    info!(
        abandoned = report.abandoned,
        discarded = report.discarded,
        forced = report.forced,
        salvaged = report.salvaged,
        "shutdown complete"
    );

    watch_result.context("watching directory")?;
    Ok(report)
}

/// Resolves on SIGINT, or on SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listening for Ctrl-C")?;
                info!("received SIGINT; shutting down");
            }
            _ = sigterm.recv() => info!("received SIGTERM; shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("listening for Ctrl-C")?;
        info!("received Ctrl-C; shutting down");
    }

    Ok(())
}

/// Print the validated settings without watching anything.
fn print_dry_run(settings: &Settings) {
    println!("settled dry-run");
    println!("  directory      = {}", settings.watch_dir.display());
    println!("  program        = {}", settings.command.program());
    println!("  args           = {:?}", settings.command.args());
    println!("  wait           = {}", humantime::format_duration(settings.inactive_delay));
    println!("  transfers      = {}", settings.transfers);
    match &settings.exclude {
        Some(re) => println!("  exclude        = /{}/", re.as_str()),
        None => println!("  exclude        = (none)"),
    }
    if settings.batching_enabled() {
        println!("  tar            = {} files per archive", settings.batch_threshold);
    } else {
        println!("  tar            = disabled");
    }
    println!("  staging_dir    = {}", settings.staging_dir.display());
    println!("  quarantine_dir = {}", settings.quarantine_dir.display());

    debug!("dry-run complete (no watching)");
}
