//! Process execution.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::CommandLine;
use crate::result::CommandResult;

/// Default bounded wait for a single external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Anything that can run a `CommandLine` and report a `CommandResult`.
///
/// Implementations must not panic or return early with an error: every
/// failure is encoded in the result.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, command: &CommandLine) -> CommandResult;
}

/// Runs commands as child processes through tokio.
///
/// The bridge holds only static configuration, so one instance can serve any
/// number of concurrent calls.
#[derive(Debug, Clone)]
pub struct CommandBridge {
    executable: String,
    workdir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandBridge {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            workdir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Run every command from this directory.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Start a command line for the configured executable.
    pub fn command<I, S>(&self, subcommand: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::new(&self.executable).subcommand(subcommand)
    }
}

#[async_trait]
impl CommandRunner for CommandBridge {
    async fn execute(&self, command: &CommandLine) -> CommandResult {
        let program = command.program();
        info!(command = %command, "Executing external command");

        let mut cmd = Command::new(program);
        cmd.args(command.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A dropped call (caller went away, timeout) takes the child with it
            .kill_on_drop(true);

        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // A missing workdir also surfaces as NotFound
                if let Some(dir) = self.workdir.as_ref().filter(|d| !d.is_dir()) {
                    warn!(workdir = %dir.display(), "Working directory does not exist");
                    return CommandResult::launch_failure(
                        program,
                        format!("working directory {} does not exist", dir.display()),
                    );
                }
                warn!(program = %program, "Executable not found");
                return CommandResult::not_found(program);
            }
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to spawn command");
                return CommandResult::launch_failure(program, e);
            }
        };

        let start = Instant::now();
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(program = %program, error = %e, "Failed to collect command output");
                return CommandResult::launch_failure(program, e);
            }
            Err(_) => {
                warn!(program = %program, timeout_ms = self.timeout.as_millis() as u64, "Command timed out");
                return CommandResult::timed_out(program, self.timeout);
            }
        };

        let exit_code = output.status.code().unwrap_or(crate::TOOL_NOT_FOUND_EXIT_CODE);
        let result = CommandResult::from_exit(
            exit_code,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        );

        info!(
            exit_code = result.exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "External command finished"
        );
        debug!(stdout = %result.output, stderr = %result.error_output, "External command output");

        result
    }
}
