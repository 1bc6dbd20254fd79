//! Command implementations for selfcheck.
//!
//! The dispatcher routes CLI commands to their implementations. Each handler
//! returns the process exit code on success; "did not run" failures
//! (configuration, planning, usage) propagate as errors and are mapped to
//! exit codes in `main`.

mod log_cmd;
mod plan;
mod run;

use crate::cli::Command;
use crate::error::Result;

/// Dispatch a command to its implementation, returning the exit code.
pub fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Run(args) => run::cmd_run(args),
        Command::Plan(args) => plan::cmd_plan(args),
        Command::Log(args) => log_cmd::cmd_log(args),
    }
}
