//! CLI argument parsing for selfcheck.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Selfcheck: tiered selftest runner for agentic development repositories.
///
/// Steps are declared in a YAML file with a tier (kernel/governance/optional),
/// severity, category, shell command, timeout, and dependency list. Runs are
/// sequential by default or wave-parallel with `--distributed`.
#[derive(Parser, Debug)]
#[command(name = "selfcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for selfcheck.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute the selftest steps and report pass/fail.
    ///
    /// Kernel failures always fail the run; governance failures fail it in
    /// strict mode and are logged as degradations in degraded mode; optional
    /// failures never block.
    Run(RunArgs),

    /// Show the static execution plan without running anything.
    Plan(PlanArgs),

    /// Show recorded degradation log entries.
    ///
    /// Legacy 1.0 entries are migrated on read (status FAIL, reason
    /// nonzero_exit).
    Log(LogArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run mode (strict, degraded, kernel-only).
    #[arg(long, default_value = "strict")]
    pub mode: String,

    /// Execute wave-by-wave with a worker pool instead of sequentially.
    #[arg(long)]
    pub distributed: bool,

    /// Worker-pool size for distributed execution.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run a single step by id, treating its dependencies as satisfied.
    /// Cannot be combined with --distributed.
    #[arg(long)]
    pub step: Option<String>,

    /// Emit the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Path to the step file (default: selfcheck.yaml, falling back to the
    /// builtin step set).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `plan` command.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Emit the plan as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Path to the step file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `log` command.
#[derive(Parser, Debug)]
pub struct LogArgs {
    /// Show at most this many entries, newest last.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Path to the degradation log (default: from the step file, or
    /// selftest_degradations.log).
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Emit entries as JSON lines instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
