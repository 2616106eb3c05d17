//! Exit codes and structured error reporting.

use serde::Serialize;

/// Exit codes for the dupelink binary.
///
/// - 0: Success
/// - 1: General error (an unrecovered failure)
/// - 2: Usage error (reported by the argument parser)
/// - 3: Partial success (some files or links failed, the rest completed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed without errors.
    Success = 0,
    /// An unrecovered error stopped the run.
    GeneralError = 1,
    /// The command line was invalid.
    Usage = 2,
    /// The run completed but skipped files or failed some links.
    PartialSuccess = 3,
    /// The run was interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DL000",
            Self::GeneralError => "DL001",
            Self::Usage => "DL002",
            Self::PartialSuccess => "DL003",
            Self::Interrupted => "DL130",
        }
    }
}

/// Raised by the application when a shutdown request ends the run early.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("operation interrupted by user")]
pub struct Interrupted;

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DL001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Pick the exit code for an error that ended the run.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<Interrupted>().is_some() {
        ExitCode::Interrupted
    } else {
        ExitCode::GeneralError
    }
}
