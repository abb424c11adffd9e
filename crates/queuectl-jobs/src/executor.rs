//! Subprocess execution of job commands.

use tokio::process::Command;
use tracing::debug;

/// Result of running a job's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0.
    Success {
        /// Captured standard output.
        stdout: String,
    },
    /// Nonzero exit or spawn failure. Feeds the retry decision; never
    /// surfaced to callers as an error.
    Failure {
        /// stderr, falling back to stdout, falling back to the exit
        /// status (or the spawn error text).
        message: String,
    },
}

impl ExecutionOutcome {
    /// Returns true for a successful execution.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

/// Runs job commands through the platform shell with captured output.
///
/// No execution timeout is imposed: a hanging command occupies its
/// worker's slot until it exits. Bounding runtimes is the job author's
/// responsibility (e.g. `timeout 30 <cmd>`).
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes `command` and captures its outcome.
    pub async fn run(&self, command: &str) -> ExecutionOutcome {
        debug!(command, "Spawning command");

        let output = shell_command(command).output().await;

        match output {
            Ok(output) if output.status.success() => ExecutionOutcome::Success {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            },
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let message = if !stderr.trim().is_empty() {
                    stderr.into_owned()
                } else if !stdout.trim().is_empty() {
                    stdout.into_owned()
                } else {
                    format!("command exited with {}", output.status)
                };
                ExecutionOutcome::Failure { message }
            }
            Err(e) => ExecutionOutcome::Failure {
                message: format!("failed to spawn command: {e}"),
            },
        }
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}
