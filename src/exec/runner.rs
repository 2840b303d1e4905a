// src/exec/runner.rs

//! Individual command process runner.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, trace, warn};

use super::backend::{forced, CommandOutcome, ForceSignal};
use super::template::Invocation;

/// Run one invocation with stdout/stderr captured.
///
/// - A spawn failure is reported as [`CommandOutcome::LaunchFailed`].
/// - If `force` fires while the process runs, the child is killed (via
///   `kill_on_drop`) and [`CommandOutcome::Cancelled`] is returned.
pub async fn run_process(invocation: Invocation, mut force: ForceSignal) -> CommandOutcome {
    if *force.borrow() {
        return CommandOutcome::Cancelled;
    }

    let mut std_cmd = std::process::Command::new(&invocation.program);
    std_cmd
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group: a Ctrl-C in the terminal reaches only us, and we
    // decide how in-flight commands end during the drain.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(command = %invocation, error = %err, "failed to launch command");
            return CommandOutcome::LaunchFailed(err.to_string());
        }
    };

    debug!(pid = ?child.id(), command = %invocation, "command started");

    tokio::select! {
        output = child.wait_with_output() => {
            let output = match output {
                Ok(output) => output,
                Err(err) => {
                    error!(command = %invocation, error = %err, "failed waiting for command");
                    return CommandOutcome::Failed(-1);
                }
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            if output.status.success() {
                trace!(
                    command = %invocation,
                    stdout = %stdout.trim_end(),
                    stderr = %stderr.trim_end(),
                    "command succeeded"
                );
                CommandOutcome::Success
            } else {
                let code = output.status.code().unwrap_or(-1);
                error!(
                    command = %invocation,
                    exit_code = code,
                    stdout = %stdout.trim_end(),
                    stderr = %stderr.trim_end(),
                    "command failed"
                );
                CommandOutcome::Failed(code)
            }
        }

        _ = forced(&mut force) => {
            // Dropping the wait future drops the child, which kills it.
            warn!(command = %invocation, "drain forced; killing running command");
            CommandOutcome::Cancelled
        }
    }
}
