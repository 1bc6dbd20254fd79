//! Degradation log: the sole persistent side effect of a selftest run.
//!
//! When a non-kernel step fails (or is skipped, or times out) in degraded
//! mode, one structured JSON line is appended to the degradation log. The
//! file is append-only: entries are never mutated, reordered, or deleted by
//! this subsystem.
//!
//! # Schema
//!
//! Current schema is `1.1`. Legacy `1.0` lines only recorded failures and
//! lack the `status` and `reason` fields; they are migrated on read with
//! `status="FAIL"` and `reason="nonzero_exit"`.
//!
//! # Invariant
//!
//! No entry ever carries `tier == "kernel"`. A kernel failure aborts the run
//! before degradation logging is considered, so an attempt to record one here
//! is a coordinator bug and trips an assertion rather than being tolerated.

use crate::coordinator::RunMode;
use crate::error::{Result, SelfcheckError};
use crate::step::{Severity, Step, StepResult, StepStatus, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current degradation log schema version.
pub const SCHEMA_VERSION: &str = "1.1";

/// Default log file name, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "selftest_degradations.log";

/// Environment variable overriding the log file location.
pub const LOG_PATH_ENV: &str = "SELFCHECK_DEGRADATION_LOG";

/// Maximum lines kept from a step's captured output in `message`.
const MESSAGE_MAX_LINES: usize = 20;

/// Maximum characters kept in `message`.
const MESSAGE_MAX_CHARS: usize = 2000;

/// One persisted record of a tolerated non-kernel failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationLogEntry {
    /// Schema version of this line.
    #[serde(default = "legacy_schema")]
    pub schema: String,

    /// When the degradation was recorded (ISO-8601 UTC).
    pub timestamp: DateTime<Utc>,

    /// Id of the step that degraded.
    pub step_id: String,

    /// Human-readable step name (description, or the id when empty).
    pub step_name: String,

    /// Tier of the step. Never `kernel`.
    pub tier: Tier,

    /// Terminal status. Legacy 1.0 lines default to FAIL.
    #[serde(default = "legacy_status")]
    pub status: StepStatus,

    /// Short cause string. Legacy 1.0 lines default to "nonzero_exit".
    #[serde(default = "legacy_reason")]
    pub reason: String,

    /// Captured output/error, truncated.
    pub message: String,

    /// Reported severity (downgraded to warning when the step allows
    /// failure in degraded mode).
    pub severity: Severity,

    /// Suggested re-run command.
    pub remediation: String,
}

fn legacy_schema() -> String {
    "1.0".to_string()
}

fn legacy_status() -> StepStatus {
    StepStatus::Fail
}

fn legacy_reason() -> String {
    "nonzero_exit".to_string()
}

/// Appends degradation entries to a JSONL log file.
#[derive(Debug, Clone)]
pub struct DegradationLogger {
    path: PathBuf,
}

impl DegradationLogger {
    /// Logger writing to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Logger honoring the `SELFCHECK_DEGRADATION_LOG` override, falling
    /// back to the given path.
    pub fn from_env_or(path: impl Into<PathBuf>) -> Self {
        match std::env::var(LOG_PATH_ENV) {
            Ok(p) if !p.is_empty() => Self::new(PathBuf::from(p)),
            _ => Self::new(path),
        }
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one tolerated non-kernel failure.
    ///
    /// Called by the coordinator exactly when `mode == Degraded`, the result
    /// status is not PASS, and the step tier is not KERNEL. The kernel guard
    /// is an assertion: reaching it with a kernel step is a coordinator bug,
    /// not a recoverable condition.
    pub fn record(&self, step: &Step, result: &StepResult, mode: RunMode) -> Result<()> {
        assert!(
            step.tier != Tier::Kernel,
            "degradation log must never receive a kernel-tier entry (step '{}')",
            step.id
        );
        debug_assert_eq!(mode, RunMode::Degraded);
        debug_assert_ne!(result.status, StepStatus::Pass);

        let entry = build_entry(step, result);
        self.append(&entry)
    }

    /// Append one entry as a single JSON line.
    ///
    /// The line is written with a single `write` call on a file opened in
    /// append mode, so concurrent writers from the same wave never interleave
    /// partial lines.
    fn append(&self, entry: &DegradationLogEntry) -> Result<()> {
        let json = serde_json::to_string(entry).map_err(|e| {
            SelfcheckError::UserError(format!("failed to serialize degradation entry: {}", e))
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                SelfcheckError::UserError(format!(
                    "failed to open degradation log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        let mut line = json;
        line.push('\n');
        file.write_all(line.as_bytes()).map_err(|e| {
            SelfcheckError::UserError(format!(
                "failed to write degradation log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Read all entries, migrating legacy 1.0 lines via serde defaults.
    pub fn read_entries(&self) -> Result<Vec<DegradationLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SelfcheckError::UserError(format!(
                "failed to read degradation log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let mut entries = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: DegradationLogEntry = serde_json::from_str(line).map_err(|e| {
                SelfcheckError::UserError(format!(
                    "malformed degradation log line {} in '{}': {}",
                    lineno + 1,
                    self.path.display(),
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

fn build_entry(step: &Step, result: &StepResult) -> DegradationLogEntry {
    let reason = match result.status {
        StepStatus::Timeout => "timeout",
        StepStatus::Skip => "dependency_not_passed",
        _ => "nonzero_exit",
    };

    let combined = if result.error.is_empty() {
        result.output.clone()
    } else if result.output.is_empty() {
        result.error.clone()
    } else {
        format!("{}\n{}", result.output, result.error)
    };

    // Steps that declare allow_fail_in_degraded report at warning severity
    // instead of their own.
    let severity = if step.allow_fail_in_degraded {
        Severity::Warning
    } else {
        step.severity
    };

    DegradationLogEntry {
        schema: SCHEMA_VERSION.to_string(),
        timestamp: Utc::now(),
        step_id: step.id.clone(),
        step_name: if step.description.is_empty() {
            step.id.clone()
        } else {
            step.description.clone()
        },
        tier: step.tier,
        status: result.status,
        reason: reason.to_string(),
        message: truncate_message(&combined, MESSAGE_MAX_LINES, MESSAGE_MAX_CHARS),
        severity,
        remediation: format!("selfcheck run --step {}", step.id),
    }
}

/// Keep the tail of the output, bounded by lines and characters.
fn truncate_message(output: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    let relevant: Vec<&str> = if lines.len() > max_lines {
        lines[lines.len() - max_lines..].to_vec()
    } else {
        lines
    };

    let mut result = relevant.join("\n");
    if result.len() > max_chars {
        let tail_start = result.len() - max_chars;
        // Avoid splitting a UTF-8 character.
        let boundary = (tail_start..result.len())
            .find(|&i| result.is_char_boundary(i))
            .unwrap_or(result.len());
        result = format!("...(truncated)...{}", &result[boundary..]);
    }

    result
}
