//! Structured result of an external call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code reported when the process never produced one.
pub const TOOL_NOT_FOUND_EXIT_CODE: i32 = -1;

/// Result of a single external command invocation.
///
/// All four fields are always populated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
    pub error_output: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// Build a result from a finished process.
    pub fn from_exit(exit_code: i32, output: String, error_output: String) -> Self {
        Self {
            success: exit_code == 0,
            output,
            error_output,
            exit_code,
        }
    }

    /// The executable could not be located.
    pub fn not_found(program: &str) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_output: format!(
                "Executable '{program}' not found. Check the installation and PATH."
            ),
            exit_code: TOOL_NOT_FOUND_EXIT_CODE,
        }
    }

    /// Any other fault while launching or waiting on the process.
    pub fn launch_failure(program: &str, error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_output: format!("Failed to run '{program}': {error}"),
            exit_code: TOOL_NOT_FOUND_EXIT_CODE,
        }
    }

    /// The bounded wait expired and the process was killed.
    pub fn timed_out(program: &str, timeout: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_output: format!("'{program}' timed out after {timeout:?}"),
            exit_code: TOOL_NOT_FOUND_EXIT_CODE,
        }
    }

    /// Successful result with the given output, mostly useful for scripted runners.
    pub fn ok(output: impl Into<String>) -> Self {
        Self::from_exit(0, output.into(), String::new())
    }

    /// Failed result with the given error output and exit code 1.
    pub fn failed(error_output: impl Into<String>) -> Self {
        Self::from_exit(1, String::new(), error_output.into())
    }
}
