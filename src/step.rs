//! Step data model for selfcheck.
//!
//! A `Step` is the unit of work: an opaque shell command with a tier,
//! severity, category, timeout, and dependency list. Steps are constructed
//! once from a declarative `StepSpec` (YAML or in-memory) via the validating
//! factory `Step::from_spec` and are immutable afterwards.

use crate::error::{Result, SelfcheckError};
use serde::{Deserialize, Serialize};

/// Default timeout for a step, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Blocking tier of a step.
///
/// KERNEL failures always fail the run; GOVERNANCE failures block in strict
/// mode but only degrade in degraded mode; OPTIONAL failures never block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Kernel,
    Governance,
    Optional,
}

impl Tier {
    /// Parse a tier from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kernel" => Some(Self::Kernel),
            "governance" => Some(Self::Governance),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Kernel => write!(f, "kernel"),
            Tier::Governance => write!(f, "governance"),
            Tier::Optional => write!(f, "optional"),
        }
    }
}

/// Informational severity of a step, independent of blocking behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    #[default]
    Warning,
    Info,
}

impl Severity {
    /// Parse a severity from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Informational category of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Performance,
    #[default]
    Correctness,
    Governance,
}

impl Category {
    /// Parse a category from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "security" => Some(Self::Security),
            "performance" => Some(Self::Performance),
            "correctness" => Some(Self::Correctness),
            "governance" => Some(Self::Governance),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Security => write!(f, "security"),
            Category::Performance => write!(f, "performance"),
            Category::Correctness => write!(f, "correctness"),
            Category::Governance => write!(f, "governance"),
        }
    }
}

/// Terminal status of a step.
///
/// The executor produces PASS, FAIL, and TIMEOUT; SKIP is assigned only by
/// the run coordinator when a dependency did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
    Skip,
    Timeout,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pass => write!(f, "PASS"),
            StepStatus::Fail => write!(f, "FAIL"),
            StepStatus::Skip => write!(f, "SKIP"),
            StepStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Command field of a step spec: a single shell string, or a list of
/// commands normalized by joining with `&&`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Single(String),
    List(Vec<String>),
}

impl CommandSpec {
    /// Normalize into a single shell command string.
    pub fn normalize(&self) -> String {
        match self {
            CommandSpec::Single(s) => s.trim().to_string(),
            CommandSpec::List(parts) => parts
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }
}

/// Declarative step specification as it appears in YAML or is constructed
/// programmatically. Loosely typed on purpose: the validating factory
/// `Step::from_spec` rejects malformed input with specific messages instead
/// of opaque deserialization errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSpec {
    pub id: String,
    pub tier: Option<String>,
    pub command: Option<CommandSpec>,
    pub description: String,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub timeout: Option<u64>,
    pub dependencies: Vec<String>,
    pub allow_fail_in_degraded: bool,
}

impl StepSpec {
    /// Convenience constructor for programmatic step sets (tests, builtins).
    pub fn new(id: &str, tier: &str, command: &str) -> Self {
        Self {
            id: id.to_string(),
            tier: Some(tier.to_string()),
            command: Some(CommandSpec::Single(command.to_string())),
            ..Default::default()
        }
    }

    /// Add a dependency on another step id.
    pub fn depends_on(mut self, dep: &str) -> Self {
        self.dependencies.push(dep.to_string());
        self
    }

    /// Override the step timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }
}

/// A validated, immutable unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    /// Unique identifier across the registry.
    pub id: String,
    /// Blocking tier.
    pub tier: Tier,
    /// Informational severity.
    pub severity: Severity,
    /// Informational category.
    pub category: Category,
    /// Opaque shell command (list input already joined with `&&`).
    pub command: String,
    /// Free-text description.
    pub description: String,
    /// Wall-clock timeout in seconds.
    pub timeout: u64,
    /// Ids of steps that must have passed before this step runs.
    pub dependencies: Vec<String>,
    /// In degraded mode, report this step's failure at warning severity
    /// instead of its declared severity.
    pub allow_fail_in_degraded: bool,
}

impl Step {
    /// Validating factory: construct a `Step` from a declarative spec.
    ///
    /// Rejects missing or empty `id`/`command`, a missing `tier` field, and
    /// unrecognized tier/severity/category values. `timeout` must be positive.
    pub fn from_spec(spec: &StepSpec) -> Result<Self> {
        if spec.id.trim().is_empty() {
            return Err(SelfcheckError::ConfigError(
                "step must have a non-empty 'id' field".to_string(),
            ));
        }
        let id = spec.id.trim().to_string();

        let tier_str = spec.tier.as_deref().ok_or_else(|| {
            SelfcheckError::ConfigError(format!("step '{}' must have a 'tier' field", id))
        })?;
        let tier = Tier::from_str(tier_str).ok_or_else(|| {
            SelfcheckError::ConfigError(format!(
                "Invalid tier '{}' for step '{}' (expected kernel, governance, or optional)",
                tier_str, id
            ))
        })?;

        let command = spec
            .command
            .as_ref()
            .map(CommandSpec::normalize)
            .unwrap_or_default();
        if command.is_empty() {
            return Err(SelfcheckError::ConfigError(format!(
                "step '{}' must have a non-empty 'command' field",
                id
            )));
        }

        let severity = match spec.severity.as_deref() {
            None => Severity::default(),
            Some(s) => Severity::from_str(s).ok_or_else(|| {
                SelfcheckError::ConfigError(format!(
                    "Invalid severity '{}' for step '{}' (expected critical, warning, or info)",
                    s, id
                ))
            })?,
        };

        let category = match spec.category.as_deref() {
            None => Category::default(),
            Some(s) => Category::from_str(s).ok_or_else(|| {
                SelfcheckError::ConfigError(format!(
                    "Invalid category '{}' for step '{}' \
                     (expected security, performance, correctness, or governance)",
                    s, id
                ))
            })?,
        };

        let timeout = spec.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(SelfcheckError::ConfigError(format!(
                "step '{}' timeout must be greater than 0",
                id
            )));
        }

        Ok(Step {
            id,
            tier,
            severity,
            category,
            command,
            description: spec.description.clone(),
            timeout,
            dependencies: spec
                .dependencies
                .iter()
                .map(|d| d.trim().to_string())
                .collect(),
            allow_fail_in_degraded: spec.allow_fail_in_degraded,
        })
    }
}

/// Outcome of executing (or skipping) one step.
///
/// Tier, severity, and category are echoed from the step so reporting does
/// not need a registry lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub output: String,
    pub error: String,
    pub exit_code: Option<i32>,
    pub tier: Tier,
    pub severity: Severity,
    pub category: Category,
}

impl StepResult {
    fn base(step: &Step, status: StepStatus) -> Self {
        Self {
            step_id: step.id.clone(),
            status,
            duration_ms: 0,
            output: String::new(),
            error: String::new(),
            exit_code: None,
            tier: step.tier,
            severity: step.severity,
            category: step.category,
        }
    }

    /// A passing result.
    pub fn pass(step: &Step, duration_ms: u64, output: String) -> Self {
        Self {
            duration_ms,
            output,
            exit_code: Some(0),
            ..Self::base(step, StepStatus::Pass)
        }
    }

    /// A failing result (nonzero exit or spawn error).
    pub fn fail(
        step: &Step,
        duration_ms: u64,
        output: String,
        error: String,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            duration_ms,
            output,
            error,
            exit_code,
            ..Self::base(step, StepStatus::Fail)
        }
    }

    /// A timed-out result. The error message always contains "Timeout" so
    /// downstream consumers can distinguish it from a generic failure.
    pub fn timeout(step: &Step, duration_ms: u64, output: String) -> Self {
        Self {
            duration_ms,
            output,
            error: format!("Timeout after {}s", step.timeout),
            ..Self::base(step, StepStatus::Timeout)
        }
    }

    /// A skipped result, assigned by the coordinator when a dependency did
    /// not pass.
    pub fn skip(step: &Step, reason: String) -> Self {
        Self {
            error: reason,
            ..Self::base(step, StepStatus::Skip)
        }
    }
}
