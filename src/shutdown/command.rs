//! External command execution.
//!
//! # Responsibilities
//! - Spawn an OS command and capture its combined output
//! - Refuse to start once the shared context is cancelled
//! - Bound the wait with a deadline
//!
//! # Design Decisions
//! - A spawned command is never killed: once `poweroff` is running the
//!   host may already be going down, and interrupting it helps nobody
//! - Shutdown methods only see the [`CommandRunner`] trait so they can be
//!   exercised with scripted runners

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// What a finished command printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr.
    pub combined: String,
}

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The binary could not be started (missing, not executable, ...).
    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("{program} failed: {status}, output: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    /// The command did not finish before the deadline. It may still be running.
    #[error("{program} did not finish within {secs} seconds")]
    TimedOut { program: String, secs: u64 },

    /// The context was cancelled before the command was started.
    #[error("{program} not started: context cancelled")]
    Cancelled { program: String },
}

/// Capability to run an external program.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
        ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, CommandError>>;
}

/// Runs commands on the real OS via `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout_duration: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
        ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, CommandError>> {
        async move {
            if ctx.is_cancelled() {
                return Err(CommandError::Cancelled { program: program.to_string() });
            }

            tracing::debug!(program = %program, args = ?args, "Running command");

            let child = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(false)
                .spawn()
                .map_err(|source| CommandError::Spawn {
                    program: program.to_string(),
                    source,
                })?;

            let output = match timeout(self.timeout_duration, child.wait_with_output()).await {
                Ok(result) => result.map_err(|source| CommandError::Spawn {
                    program: program.to_string(),
                    source,
                })?,
                Err(_) => {
                    return Err(CommandError::TimedOut {
                        program: program.to_string(),
                        secs: self.timeout_duration.as_secs(),
                    })
                }
            };

            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));

            check_status(program, output.status, combined)
        }
        .boxed()
    }
}

fn check_status(
    program: &str,
    status: ExitStatus,
    combined: String,
) -> Result<CommandOutput, CommandError> {
    if status.success() {
        Ok(CommandOutput { combined })
    } else {
        Err(CommandError::Failed {
            program: program.to_string(),
            status: status.to_string(),
            output: combined.trim_end().to_string(),
        })
    }
}
