//! The `log` command: show recorded degradation entries.
//!
//! Reads the JSONL degradation log, migrating legacy 1.0 lines on the fly,
//! and prints the newest entries.

use crate::cli::LogArgs;
use crate::config;
use crate::degradation::DegradationLogger;
use crate::error::Result;
use crate::exit_codes;

pub fn cmd_log(args: LogArgs) -> Result<i32> {
    let logger = match &args.file {
        Some(path) => DegradationLogger::new(path),
        None => {
            let config = config::resolve(None)?;
            DegradationLogger::from_env_or(&config.degradation_log)
        }
    };

    let entries = logger.read_entries()?;
    if entries.is_empty() {
        println!("No degradation entries in '{}'.", logger.path().display());
        return Ok(exit_codes::SUCCESS);
    }

    let start = entries.len().saturating_sub(args.limit);
    let shown = &entries[start..];

    if args.json {
        for entry in shown {
            println!(
                "{}",
                serde_json::to_string(entry).unwrap_or_else(|_| "{}".to_string())
            );
        }
        return Ok(exit_codes::SUCCESS);
    }

    println!(
        "Degradation log '{}' ({} of {} entries):",
        logger.path().display(),
        shown.len(),
        entries.len()
    );
    println!();
    for entry in shown {
        println!(
            "  {}  {:7} {:10} {:20} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.status.to_string(),
            entry.tier.to_string(),
            entry.step_id,
            entry.reason
        );
        let first_line = entry.message.lines().next().unwrap_or("");
        if !first_line.is_empty() {
            println!("      {}", first_line);
        }
    }

    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::LogArgs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_log_is_success() {
        let temp = TempDir::new().unwrap();
        let args = LogArgs {
            limit: 20,
            file: Some(temp.path().join("absent.log")),
            json: false,
        };
        assert_eq!(cmd_log(args).unwrap(), exit_codes::SUCCESS);
    }

    #[test]
    fn test_reads_legacy_and_current_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deg.log");
        let legacy = r#"{"timestamp":"2024-03-01T12:00:00Z","step_id":"old","step_name":"old","tier":"governance","message":"failed","severity":"warning","remediation":"selftest --step old"}"#;
        let current = r#"{"schema":"1.1","timestamp":"2025-01-01T00:00:00Z","step_id":"new","step_name":"new","tier":"optional","status":"TIMEOUT","reason":"timeout","message":"","severity":"info","remediation":"selfcheck run --step new"}"#;
        std::fs::write(&path, format!("{}\n{}\n", legacy, current)).unwrap();

        let args = LogArgs {
            limit: 20,
            file: Some(path),
            json: true,
        };
        assert_eq!(cmd_log(args).unwrap(), exit_codes::SUCCESS);
    }

    #[test]
    fn test_malformed_log_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deg.log");
        std::fs::write(&path, "not json\n").unwrap();

        let args = LogArgs {
            limit: 20,
            file: Some(path),
            json: false,
        };
        assert!(cmd_log(args).is_err());
    }
}
