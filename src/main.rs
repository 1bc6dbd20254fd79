//! Selfcheck: tiered selftest runner for agentic development repositories.
//!
//! This is the main entry point for the `selfcheck` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and maps outcomes to exit
//! codes: 0 for a passing run, 1 for a failing run, and distinct codes for
//! configuration/planning errors where nothing was executed.

mod cli;
mod commands;
pub mod config;
pub mod coordinator;
pub mod degradation;
pub mod error;
pub mod executor;
pub mod exit_codes;
pub mod registry;
pub mod report;
pub mod step;
pub mod waves;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::dispatch(cli.command) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
