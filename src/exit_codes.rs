//! Exit code constants for the selfcheck CLI.
//!
//! - 0: Success (run completed with overall PASS)
//! - 1: Run failure (run completed, overall status FAIL)
//! - 2: User error (bad arguments, invalid flag combinations)
//! - 3: Configuration error (malformed step set; nothing was executed)
//! - 4: Planning error (steps could not be placed into waves; nothing was executed)
//!
//! Codes 3 and 4 are "did not run" outcomes: they are never produced after
//! any step has started executing.

/// Successful execution: the run completed and its overall status is PASS.
pub const SUCCESS: i32 = 0;

/// The run completed but its overall status is FAIL.
pub const RUN_FAILURE: i32 = 1;

/// User error: bad arguments or an invalid flag combination.
pub const USER_ERROR: i32 = 2;

/// Configuration error: duplicate ids, dangling or circular dependencies,
/// missing required fields, or unrecognized enum values.
pub const CONFIG_ERROR: i32 = 3;

/// Planning error: the wave planner could not place every step.
pub const PLANNING_ERROR: i32 = 4;
