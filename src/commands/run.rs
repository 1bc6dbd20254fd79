//! The `run` command: execute the selftest steps and report.

use crate::cli::RunArgs;
use crate::config;
use crate::coordinator::{Coordinator, RunMode};
use crate::degradation::DegradationLogger;
use crate::error::{Result, SelfcheckError};
use crate::exit_codes;
use crate::registry::Registry;
use crate::report::RunStatus;

pub fn cmd_run(args: RunArgs) -> Result<i32> {
    let mode = RunMode::from_str(&args.mode).ok_or_else(|| {
        SelfcheckError::UserError(format!(
            "invalid mode '{}' (expected strict, degraded, or kernel-only)",
            args.mode
        ))
    })?;

    if args.distributed && args.step.is_some() {
        return Err(SelfcheckError::UserError(
            "--distributed cannot be combined with --step".to_string(),
        ));
    }

    let config = config::resolve(args.config.as_deref())?;
    let registry = Registry::load(&config.steps)?;
    if registry.is_empty() {
        return Err(SelfcheckError::ConfigError(
            "step file declares no steps".to_string(),
        ));
    }

    let logger = DegradationLogger::from_env_or(&config.degradation_log);
    let coordinator = Coordinator::new(registry, mode).with_logger(logger);

    let report = if args.distributed {
        let workers = args.workers.unwrap_or(config.workers);
        coordinator.run_distributed(workers)?
    } else if let Some(id) = &args.step {
        coordinator.run_single(id)?
    } else {
        coordinator.run_sequential()
    };

    if args.json {
        println!("{}", report.to_json());
    } else {
        print!("{}", report.render_table());
    }

    Ok(if report.status == RunStatus::Pass {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUN_FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RunArgs;
    use serial_test::serial;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args() -> RunArgs {
        RunArgs {
            mode: "strict".to_string(),
            distributed: false,
            workers: None,
            step: None,
            json: false,
            config: None,
        }
    }

    fn write_steps(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("steps.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_invalid_mode_is_user_error() {
        let mut a = args();
        a.mode = "lenient".to_string();
        let err = cmd_run(a).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn test_distributed_step_combination_rejected() {
        let mut a = args();
        a.distributed = true;
        a.step = Some("x".to_string());
        let err = cmd_run(a).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn test_missing_explicit_config_is_config_error() {
        let mut a = args();
        a.config = Some(PathBuf::from("/nonexistent/steps.yaml"));
        let err = cmd_run(a).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_empty_step_file_rejected() {
        let temp = TempDir::new().unwrap();
        let mut a = args();
        a.config = Some(write_steps(&temp, "steps: []\n"));
        let err = cmd_run(a).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }

    #[test]
    #[serial]
    fn test_passing_run_exits_success() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("deg.log");
        unsafe { std::env::set_var(crate::degradation::LOG_PATH_ENV, &log) };

        let mut a = args();
        a.json = true;
        a.config = Some(write_steps(
            &temp,
            "steps:\n  - id: ok\n    tier: kernel\n    command: \"true\"\n",
        ));
        let code = cmd_run(a).unwrap();
        unsafe { std::env::remove_var(crate::degradation::LOG_PATH_ENV) };

        assert_eq!(code, exit_codes::SUCCESS);
    }

    #[test]
    #[serial]
    fn test_failing_run_exits_run_failure() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("deg.log");
        unsafe { std::env::set_var(crate::degradation::LOG_PATH_ENV, &log) };

        let mut a = args();
        a.json = true;
        a.config = Some(write_steps(
            &temp,
            "steps:\n  - id: bad\n    tier: kernel\n    command: \"false\"\n",
        ));
        let code = cmd_run(a).unwrap();
        unsafe { std::env::remove_var(crate::degradation::LOG_PATH_ENV) };

        assert_eq!(code, exit_codes::RUN_FAILURE);
    }

    #[test]
    #[serial]
    fn test_degraded_run_writes_degradation_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("deg.log");
        unsafe { std::env::set_var(crate::degradation::LOG_PATH_ENV, &log) };

        let mut a = args();
        a.mode = "degraded".to_string();
        a.json = true;
        a.config = Some(write_steps(
            &temp,
            "steps:\n  - id: k\n    tier: kernel\n    command: \"true\"\n  - id: g\n    tier: governance\n    command: \"false\"\n",
        ));
        let code = cmd_run(a).unwrap();
        unsafe { std::env::remove_var(crate::degradation::LOG_PATH_ENV) };

        assert_eq!(code, exit_codes::SUCCESS);
        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"g\""));
    }
}
