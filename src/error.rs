//! Error types for the selfcheck CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//!
//! Step-level failures (nonzero exit, timeout) are *data*, not errors: they are
//! recorded in a `StepResult` and folded into the run report. The variants here
//! cover the "did not run" paths only; a caller always gets either a complete
//! report or exactly one of these errors.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for selfcheck operations.
///
/// Each variant maps to a specific exit code so callers can distinguish
/// "the run failed" from "the run never started".
#[derive(Error, Debug)]
pub enum SelfcheckError {
    /// User provided invalid arguments or an invalid flag combination.
    #[error("{0}")]
    UserError(String),

    /// Step configuration is malformed (missing fields, invalid enum values,
    /// duplicate ids, dangling or circular dependencies). Detected before any
    /// step executes.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The wave planner could not place every step into a wave. Registry
    /// validation should make this unreachable, but the planner re-checks
    /// placement independently.
    #[error("Planning error: {0}")]
    PlanningError(String),
}

impl SelfcheckError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SelfcheckError::UserError(_) => exit_codes::USER_ERROR,
            SelfcheckError::ConfigError(_) => exit_codes::CONFIG_ERROR,
            SelfcheckError::PlanningError(_) => exit_codes::PLANNING_ERROR,
        }
    }
}

/// Result type alias for selfcheck operations.
pub type Result<T> = std::result::Result<T, SelfcheckError>;
