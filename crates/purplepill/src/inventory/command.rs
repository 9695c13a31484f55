//! Execution of the external GPU query tool.

use core::error::Error;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::Display;
use tokio::process::Command;

/// Default bound for a single tool invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to obtain output from an external command.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[display("`{program}` not found")]
    NotFound { program: String },
    #[display("failed to run `{program}`: {message}")]
    Spawn { program: String, message: String },
    #[display("`{program}` exited with {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: String,
        stderr: String,
    },
    #[display("`{program}` timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

impl Error for CommandError {}

/// Runs a command to completion and hands back its stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// [`CommandRunner`] backed by real child processes.
///
/// The child is killed when it outlives the timeout or the caller drops the
/// future.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    #[tracing::instrument(level = "trace", skip(self))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CommandError::NotFound {
                    program: program.to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(CommandError::Spawn {
                    program: program.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(CommandError::TimedOut {
                    program: program.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
