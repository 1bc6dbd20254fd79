//! Report assembly and rendering.
//!
//! Pure aggregation over terminal step results: counts, tier/severity/
//! category breakdowns, the `*_ok` flags, and the mode-aware overall status.
//! Rendering produces either a stable human table or a versioned JSON
//! object; neither performs I/O.

use crate::coordinator::RunMode;
use crate::registry::Registry;
use crate::step::{StepResult, StepStatus, Tier};
use serde::Serialize;
use std::collections::BTreeMap;

/// Schema version of the plan JSON object.
pub const PLAN_SCHEMA_VERSION: &str = "1.0";

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pass => write!(f, "PASS"),
            RunStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Pass/fail/skip counts for one breakdown bucket.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl StatusCounts {
    fn add(&mut self, status: StepStatus) {
        self.total += 1;
        match status {
            StepStatus::Pass => self.passed += 1,
            StepStatus::Skip => self.skipped += 1,
            // Timeouts count as failures.
            StepStatus::Fail | StepStatus::Timeout => self.failed += 1,
        }
    }
}

/// Summary of one completed wave (distributed mode only).
#[derive(Debug, Clone, Serialize)]
pub struct WaveSummary {
    /// Zero-based wave number.
    pub wave: usize,
    /// Step ids in this wave.
    pub steps: Vec<String>,
    /// Wall-clock duration of the wave.
    pub duration_ms: u64,
    /// True if every step in the wave passed.
    pub all_passed: bool,
    /// Terminal results of the wave's steps.
    pub results: Vec<StepResult>,
}

/// Distributed-mode timing summary.
#[derive(Debug, Clone, Serialize)]
pub struct DistributedSummary {
    /// Sum of all step durations (what a sequential run would have cost).
    pub sequential_estimate_ms: u64,
    /// Observed wall-clock time across all waves.
    pub actual_duration_ms: u64,
    /// `sequential_estimate_ms / actual_duration_ms`.
    pub speedup: f64,
}

/// Wave execution metadata handed to the assembler by the coordinator.
#[derive(Debug, Clone)]
pub struct WaveMetadata {
    pub waves: Vec<WaveSummary>,
    pub actual_duration_ms: u64,
}

/// Aggregate output of one run invocation. Created fresh per run and not
/// persisted by this subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub mode: RunMode,
    pub execution_mode: &'static str,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub kernel_ok: bool,
    pub governance_ok: bool,
    pub optional_ok: bool,
    pub failed_steps: Vec<String>,
    pub results: Vec<StepResult>,
    pub by_tier: BTreeMap<String, StatusCounts>,
    pub by_severity: BTreeMap<String, StatusCounts>,
    pub by_category: BTreeMap<String, StatusCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waves: Option<Vec<WaveSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DistributedSummary>,
}

/// Aggregate terminal results into a report.
///
/// The blocking policy: kernel failures always fail the run; governance
/// failures fail it in strict mode only; optional failures never do.
pub fn assemble(
    results: Vec<StepResult>,
    mode: RunMode,
    wave_metadata: Option<WaveMetadata>,
) -> RunReport {
    let mut totals = StatusCounts::default();
    let mut by_tier: BTreeMap<String, StatusCounts> = BTreeMap::new();
    let mut by_severity: BTreeMap<String, StatusCounts> = BTreeMap::new();
    let mut by_category: BTreeMap<String, StatusCounts> = BTreeMap::new();

    let mut kernel_ok = true;
    let mut governance_ok = true;
    let mut optional_ok = true;
    let mut failed_steps = Vec::new();

    for result in &results {
        totals.add(result.status);
        by_tier
            .entry(result.tier.to_string())
            .or_default()
            .add(result.status);
        by_severity
            .entry(result.severity.to_string())
            .or_default()
            .add(result.status);
        by_category
            .entry(result.category.to_string())
            .or_default()
            .add(result.status);

        if result.status != StepStatus::Pass {
            match result.tier {
                Tier::Kernel => kernel_ok = false,
                Tier::Governance => governance_ok = false,
                Tier::Optional => optional_ok = false,
            }
        }
        if matches!(result.status, StepStatus::Fail | StepStatus::Timeout) {
            failed_steps.push(result.step_id.clone());
        }
    }

    let status = if kernel_ok && (governance_ok || mode == RunMode::Degraded) {
        RunStatus::Pass
    } else {
        RunStatus::Fail
    };

    let (execution_mode, waves, summary) = match wave_metadata {
        None => ("sequential", None, None),
        Some(meta) => {
            let sequential_estimate_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
            let actual = meta.actual_duration_ms;
            let speedup = sequential_estimate_ms as f64 / actual.max(1) as f64;
            (
                "distributed",
                Some(meta.waves),
                Some(DistributedSummary {
                    sequential_estimate_ms,
                    actual_duration_ms: actual,
                    speedup,
                }),
            )
        }
    };

    RunReport {
        status,
        mode,
        execution_mode,
        passed: totals.passed,
        failed: totals.failed,
        skipped: totals.skipped,
        total: totals.total,
        kernel_ok,
        governance_ok,
        optional_ok,
        failed_steps,
        results,
        by_tier,
        by_severity,
        by_category,
        waves,
        summary,
    }
}

impl RunReport {
    /// Render the report as machine JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Render the report as a human-readable table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "selfcheck {} ({} mode, {})\n",
            self.status, self.mode, self.execution_mode
        ));
        out.push_str(&format!("runner: {}\n\n", runner_identity()));

        let id_width = self
            .results
            .iter()
            .map(|r| r.step_id.len())
            .max()
            .unwrap_or(4)
            .max(4);

        for result in &self.results {
            out.push_str(&format!(
                "  {:7} {:id_width$}  {:10}  {:>7}ms",
                result.status.to_string(),
                result.step_id,
                result.tier.to_string(),
                result.duration_ms,
            ));
            if !result.error.is_empty() {
                let first_line = result.error.lines().next().unwrap_or("");
                out.push_str(&format!("  {}", first_line));
            }
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&format!(
            "  passed: {}  failed: {}  skipped: {}  total: {}\n",
            self.passed, self.failed, self.skipped, self.total
        ));
        out.push_str(&format!(
            "  kernel_ok: {}  governance_ok: {}  optional_ok: {}\n",
            self.kernel_ok, self.governance_ok, self.optional_ok
        ));

        if let Some(summary) = &self.summary {
            out.push_str(&format!(
                "  waves: {}  wall clock: {}ms  sequential estimate: {}ms  speedup: {:.2}x\n",
                self.waves.as_ref().map(|w| w.len()).unwrap_or(0),
                summary.actual_duration_ms,
                summary.sequential_estimate_ms,
                summary.speedup
            ));
        }

        out
    }
}

/// `user@host` identity shown in the report header.
fn runner_identity() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Stable plan JSON for external reporting/UI consumers.
#[derive(Debug, Clone, Serialize)]
pub struct PlanJson {
    pub version: String,
    pub steps: Vec<PlanStep>,
    pub summary: PlanSummary,
}

/// One step in the plan JSON.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub tier: Tier,
    pub severity: crate::step::Severity,
    pub category: crate::step::Category,
    pub description: String,
    pub depends_on: Vec<String>,
}

/// Per-tier totals in the plan JSON.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub total: usize,
    pub by_tier: BTreeMap<String, usize>,
}

/// Build the static execution plan for a registry without executing anything.
pub fn assemble_plan(registry: &Registry) -> PlanJson {
    let steps: Vec<PlanStep> = registry
        .steps()
        .iter()
        .map(|s| PlanStep {
            id: s.id.clone(),
            tier: s.tier,
            severity: s.severity,
            category: s.category,
            description: s.description.clone(),
            depends_on: s.dependencies.clone(),
        })
        .collect();

    let mut by_tier: BTreeMap<String, usize> = BTreeMap::new();
    by_tier.insert(Tier::Kernel.to_string(), 0);
    by_tier.insert(Tier::Governance.to_string(), 0);
    by_tier.insert(Tier::Optional.to_string(), 0);
    for step in registry.steps() {
        *by_tier.entry(step.tier.to_string()).or_default() += 1;
    }

    PlanJson {
        version: PLAN_SCHEMA_VERSION.to_string(),
        summary: PlanSummary {
            total: steps.len(),
            by_tier,
        },
        steps,
    }
}

impl PlanJson {
    /// Render the plan as machine JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Render the plan as a human-readable table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("execution plan ({} steps)\n\n", self.summary.total));

        let id_width = self.steps.iter().map(|s| s.id.len()).max().unwrap_or(4).max(4);
        for step in &self.steps {
            out.push_str(&format!(
                "  {:id_width$}  {:10}  {:8}  {}",
                step.id,
                step.tier.to_string(),
                step.severity.to_string(),
                if step.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    format!("after: {}", step.depends_on.join(", "))
                }
            ));
            out.push('\n');
        }

        out.push('\n');
        let tiers: Vec<String> = self
            .summary
            .by_tier
            .iter()
            .map(|(tier, n)| format!("{}: {}", tier, n))
            .collect();
        out.push_str(&format!("  by tier: {}\n", tiers.join("  ")));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Step, StepSpec};

    fn step(id: &str, tier: &str) -> Step {
        Step::from_spec(&StepSpec::new(id, tier, "true")).unwrap()
    }

    fn pass(s: &Step) -> StepResult {
        StepResult::pass(s, 10, String::new())
    }

    fn fail(s: &Step) -> StepResult {
        StepResult::fail(s, 10, String::new(), "boom".to_string(), Some(1))
    }

    #[test]
    fn test_all_pass_strict() {
        let k = step("k", "kernel");
        let report = assemble(vec![pass(&k)], RunMode::Strict, None);

        assert_eq!(report.status, RunStatus::Pass);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.total, 1);
        assert!(report.kernel_ok);
        assert_eq!(report.execution_mode, "sequential");
    }

    #[test]
    fn test_kernel_failure_fails_in_every_mode() {
        let k = step("k", "kernel");
        for mode in [RunMode::Strict, RunMode::Degraded, RunMode::KernelOnly] {
            let report = assemble(vec![fail(&k)], mode, None);
            assert_eq!(report.status, RunStatus::Fail, "mode {:?}", mode);
            assert!(!report.kernel_ok);
        }
    }

    #[test]
    fn test_governance_failure_blocks_only_in_strict() {
        let k = step("k", "kernel");
        let g = step("g", "governance");

        let strict = assemble(vec![pass(&k), fail(&g)], RunMode::Strict, None);
        assert_eq!(strict.status, RunStatus::Fail);
        assert!(!strict.governance_ok);

        let degraded = assemble(vec![pass(&k), fail(&g)], RunMode::Degraded, None);
        assert_eq!(degraded.status, RunStatus::Pass);
        assert!(degraded.kernel_ok);
        assert!(!degraded.governance_ok);
    }

    #[test]
    fn test_optional_failure_never_blocks() {
        let k = step("k", "kernel");
        let o = step("o", "optional");

        for mode in [RunMode::Strict, RunMode::Degraded] {
            let report = assemble(vec![pass(&k), fail(&o)], mode, None);
            assert_eq!(report.status, RunStatus::Pass, "mode {:?}", mode);
            assert!(!report.optional_ok);
        }
    }

    #[test]
    fn test_timeout_counts_as_failed() {
        let k = step("k", "kernel");
        let timeout = StepResult::timeout(&k, 60_000, String::new());
        let report = assemble(vec![timeout], RunMode::Strict, None);

        assert_eq!(report.failed, 1);
        assert_eq!(report.status, RunStatus::Fail);
        assert_eq!(report.failed_steps, vec!["k"]);
    }

    #[test]
    fn test_skip_is_not_failed() {
        let k = step("k", "kernel");
        let g = step("g", "governance");
        let skip = StepResult::skip(&g, "dependency 'k' did not pass".to_string());
        let report = assemble(vec![fail(&k), skip], RunMode::Strict, None);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        // A skipped governance step is still not a PASS, so the flag drops.
        assert!(!report.governance_ok);
        assert_eq!(report.failed_steps, vec!["k"]);
    }

    #[test]
    fn test_breakdowns() {
        let k = step("k", "kernel");
        let g = step("g", "governance");
        let report = assemble(vec![pass(&k), fail(&g)], RunMode::Strict, None);

        assert_eq!(report.by_tier["kernel"].passed, 1);
        assert_eq!(report.by_tier["governance"].failed, 1);
        assert_eq!(report.by_severity["warning"].total, 2);
        assert_eq!(report.by_category["correctness"].total, 2);
    }

    #[test]
    fn test_distributed_summary_speedup() {
        let k = step("k", "kernel");
        let g = step("g", "governance");
        let results = vec![pass(&k), pass(&g)]; // 10ms each

        let meta = WaveMetadata {
            waves: vec![],
            actual_duration_ms: 10,
        };
        let report = assemble(results, RunMode::Strict, Some(meta));

        assert_eq!(report.execution_mode, "distributed");
        let summary = report.summary.unwrap();
        assert_eq!(summary.sequential_estimate_ms, 20);
        assert_eq!(summary.actual_duration_ms, 10);
        assert!((summary.speedup - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_rendering_has_stable_fields() {
        let k = step("k", "kernel");
        let report = assemble(vec![pass(&k)], RunMode::Strict, None);
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();

        assert_eq!(json["status"], "PASS");
        assert_eq!(json["passed"], 1);
        assert_eq!(json["kernel_ok"], true);
        assert!(json["results"].is_array());
        assert!(json["by_severity"].is_object());
        assert!(json.get("waves").is_none());
    }

    #[test]
    fn test_table_rendering() {
        let k = step("k", "kernel");
        let g = step("g", "governance");
        let report = assemble(vec![pass(&k), fail(&g)], RunMode::Strict, None);
        let table = report.render_table();

        assert!(table.contains("FAIL"));
        assert!(table.contains("passed: 1"));
        assert!(table.contains("governance_ok: false"));
        assert!(table.contains('@'));
    }

    #[test]
    fn test_plan_json_schema() {
        let registry = Registry::load(&[
            StepSpec::new("k", "kernel", "true"),
            StepSpec::new("g", "governance", "true").depends_on("k"),
        ])
        .unwrap();

        let plan = assemble_plan(&registry);
        assert_eq!(plan.version, PLAN_SCHEMA_VERSION);
        assert_eq!(plan.summary.total, 2);
        assert_eq!(plan.summary.by_tier["kernel"], 1);
        assert_eq!(plan.summary.by_tier["governance"], 1);
        assert_eq!(plan.summary.by_tier["optional"], 0);
        assert_eq!(plan.summary.by_tier.values().sum::<usize>(), plan.steps.len());

        let json: serde_json::Value = serde_json::from_str(&plan.to_json()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["steps"][1]["depends_on"][0], "k");
        assert_eq!(json["steps"][0]["tier"], "kernel");
    }

    #[test]
    fn test_plan_is_idempotent() {
        let registry = Registry::load(&[
            StepSpec::new("k", "kernel", "true"),
            StepSpec::new("o", "optional", "true"),
        ])
        .unwrap();

        let a = assemble_plan(&registry).to_json();
        let b = assemble_plan(&registry).to_json();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_table() {
        let registry = Registry::load(&[
            StepSpec::new("k", "kernel", "true"),
            StepSpec::new("g", "governance", "true").depends_on("k"),
        ])
        .unwrap();
        let table = assemble_plan(&registry).render_table();

        assert!(table.contains("execution plan (2 steps)"));
        assert!(table.contains("after: k"));
    }
}
