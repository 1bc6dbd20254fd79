//! Configuration model for selfcheck.
//!
//! Represents the step file (`selfcheck.yaml` by default): the declarative
//! step list plus run-level settings. Unknown YAML fields are ignored for
//! forward compatibility. When no step file exists, a small builtin step set
//! probing the local repository is used so `selfcheck run` works out of the
//! box.

use crate::coordinator::DEFAULT_WORKERS;
use crate::degradation::DEFAULT_LOG_FILE;
use crate::error::{Result, SelfcheckError};
use crate::step::StepSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default step file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "selfcheck.yaml";

/// Configuration for one selfcheck invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Declarative step list.
    pub steps: Vec<StepSpec>,

    /// Worker-pool size for distributed execution.
    pub workers: usize,

    /// Degradation log path.
    pub degradation_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps: builtin_steps(),
            workers: DEFAULT_WORKERS,
            degradation_log: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Builtin step set used when no step file exists: a minimal kernel/
/// governance/optional trio probing the local repository.
pub fn builtin_steps() -> Vec<StepSpec> {
    let mut repo = StepSpec::new("git_repo", "kernel", "git rev-parse --git-dir");
    repo.description = "Working directory is inside a git repository".to_string();
    repo.severity = Some("critical".to_string());

    let mut whitespace =
        StepSpec::new("git_whitespace", "governance", "git diff --check").depends_on("git_repo");
    whitespace.description = "No whitespace errors in unstaged changes".to_string();
    whitespace.category = Some("governance".to_string());

    let mut toolchain = StepSpec::new("git_version", "optional", "git --version");
    toolchain.description = "Git toolchain is reachable".to_string();
    toolchain.severity = Some("info".to_string());

    vec![repo, whitespace, toolchain]
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SelfcheckError::ConfigError(format!(
                "failed to read step file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| SelfcheckError::ConfigError(format!("failed to parse step file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            SelfcheckError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate run-level settings. Step-level validation happens in the
    /// registry, which has the full picture for dependency checks.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SelfcheckError::ConfigError(
                "workers must be greater than 0".to_string(),
            ));
        }
        if self.degradation_log.trim().is_empty() {
            return Err(SelfcheckError::ConfigError(
                "degradation_log must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config for a run: an explicit path must load, the default
/// path loads when present, otherwise the builtin step set applies.
pub fn resolve(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                Config::load(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.degradation_log, DEFAULT_LOG_FILE);
        assert!(!config.steps.is_empty());
    }

    #[test]
    fn test_builtin_steps_load_as_registry() {
        let registry = Registry::load(&builtin_steps()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("git_repo").is_some());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = Config::from_yaml("steps: []").unwrap();
        assert!(config.steps.is_empty());
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
workers: 2
degradation_log: custom_degradations.log
steps:
  - id: build
    tier: kernel
    command: cargo check
    severity: critical
    timeout: 300
  - id: lint
    tier: governance
    command:
      - cargo fmt --check
      - cargo clippy
    dependencies: [build]
    allow_fail_in_degraded: true
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.degradation_log, "custom_degradations.log");
        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[0].timeout, Some(300));
        assert!(config.steps[1].allow_fail_in_degraded);

        let registry = Registry::load(&config.steps).unwrap();
        assert_eq!(
            registry.get("lint").unwrap().command,
            "cargo fmt --check && cargo clippy"
        );
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let yaml = r#"
steps: []
future_feature: enabled
nested_unknown:
  key: value
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Config::from_yaml("workers: 0").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_empty_log_path_rejected() {
        let err = Config::from_yaml("degradation_log: \"  \"").unwrap_err();
        assert!(err.to_string().contains("degradation_log"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/selfcheck.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read step file"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers: 8").unwrap();
        writeln!(file, "steps:").unwrap();
        writeln!(file, "  - id: probe").unwrap();
        writeln!(file, "    tier: optional").unwrap();
        writeln!(file, "    command: \"true\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.steps.len(), 1);
    }

    #[test]
    fn test_resolve_explicit_missing_is_error() {
        let err = resolve(Some(Path::new("/nonexistent/steps.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.workers, config.workers);
        assert_eq!(parsed.steps.len(), config.steps.len());
    }
}
