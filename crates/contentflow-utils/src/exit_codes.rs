//! Exit code constants for contentflow.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 4 | `RUN_NOT_FOUND` | Requested run id does not exist |
//! | 9 | `RUN_IN_PROGRESS` | Another run is already active |
//! | 20 | `RUN_FAILED` | The run finished with status `failed` |

use crate::types::RunStatus;

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public CLI contract.
///
/// # Example
///
/// ```rust
/// use contentflow_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::RUN_FAILED, ExitCode::from_i32(20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Run not found - no record exists for the requested id
    pub const RUN_NOT_FOUND: ExitCode = ExitCode(4);

    /// Run in progress - the active-run policy rejected a new run
    pub const RUN_IN_PROGRESS: ExitCode = ExitCode(9);

    /// Run failed - the pipeline ended with status `failed`
    pub const RUN_FAILED: ExitCode = ExitCode(20);

    /// Get the numeric exit code value.
    ///
    /// Use this with `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Exit code for a run that reached a status.
    ///
    /// Only `failed` maps to a non-zero code; a run observed while still
    /// pending or running is not an error.
    #[must_use]
    pub const fn for_run_status(status: RunStatus) -> Self {
        match status {
            RunStatus::Failed => Self::RUN_FAILED,
            RunStatus::Pending | RunStatus::Running | RunStatus::Completed => Self::SUCCESS,
        }
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::RUN_NOT_FOUND.as_i32(), 4);
        assert_eq!(ExitCode::RUN_IN_PROGRESS.as_i32(), 9);
        assert_eq!(ExitCode::RUN_FAILED.as_i32(), 20);
    }

    #[test]
    fn test_for_run_status() {
        assert_eq!(
            ExitCode::for_run_status(RunStatus::Completed),
            ExitCode::SUCCESS
        );
        assert_eq!(
            ExitCode::for_run_status(RunStatus::Failed),
            ExitCode::RUN_FAILED
        );
        assert_eq!(
            ExitCode::for_run_status(RunStatus::Running),
            ExitCode::SUCCESS
        );
    }

    #[test]
    fn test_i32_conversions() {
        let code: i32 = ExitCode::RUN_IN_PROGRESS.into();
        assert_eq!(code, 9);
        assert_eq!(ExitCode::from(4), ExitCode::RUN_NOT_FOUND);
    }
}
