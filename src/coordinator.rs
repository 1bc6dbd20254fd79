//! Run coordinator: the central state machine of a selftest run.
//!
//! Orchestrates execution over the registry in sequential or distributed
//! (wave-parallel) order, applies the mode policy to decide overall
//! pass/fail, skips steps whose dependencies did not pass, records
//! degradations for tolerated non-kernel failures, and fans lifecycle
//! callbacks out to registered observers.
//!
//! Step-level state machine: PENDING -> RUNNING -> (PASS|FAIL|TIMEOUT), or
//! straight to SKIPPED when any dependency resolved to a status other than
//! PASS (skip propagates transitively).

use crate::degradation::DegradationLogger;
use crate::error::{Result, SelfcheckError};
use crate::executor;
use crate::registry::Registry;
use crate::report::{self, PlanJson, RunReport, WaveMetadata, WaveSummary};
use crate::step::{Step, StepResult, StepStatus, Tier};
use crate::waves::plan_waves;
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::Instant;

/// Default worker-pool size for distributed execution.
pub const DEFAULT_WORKERS: usize = 4;

/// Run-level mode. Applies to the whole invocation, never per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Kernel and governance failures both fail the run.
    Strict,
    /// Governance failures are logged as degradations instead of blocking.
    Degraded,
    /// Only kernel steps are in scope; others are excluded entirely.
    KernelOnly,
}

impl RunMode {
    /// Parse a mode from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "degraded" => Some(Self::Degraded),
            "kernel-only" => Some(Self::KernelOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Strict => write!(f, "strict"),
            RunMode::Degraded => write!(f, "degraded"),
            RunMode::KernelOnly => write!(f, "kernel-only"),
        }
    }
}

/// Lifecycle observer for step execution.
///
/// `on_step_start` fires immediately before a step transitions to RUNNING;
/// `on_step_complete` fires after any terminal status is assigned, including
/// SKIP. Observer panics are caught and never abort the run. In distributed
/// mode callbacks fire on worker threads.
pub trait RunObserver: Send + Sync {
    fn on_step_start(&self, _step: &Step) {}
    fn on_step_complete(&self, _step: &Step, _result: &StepResult) {}
}

/// Orchestrates one run over a validated registry.
pub struct Coordinator {
    registry: Registry,
    mode: RunMode,
    logger: Option<DegradationLogger>,
    observers: Vec<Box<dyn RunObserver>>,
}

impl Coordinator {
    /// Coordinator with no degradation persistence (callers that want the
    /// log attach one with [`with_logger`](Self::with_logger)).
    pub fn new(registry: Registry, mode: RunMode) -> Self {
        Self {
            registry,
            mode,
            logger: None,
            observers: Vec::new(),
        }
    }

    /// Attach the degradation logger used for tolerated non-kernel failures
    /// in degraded mode.
    pub fn with_logger(mut self, logger: DegradationLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Register a lifecycle observer. Observers are invoked in registration
    /// order.
    pub fn add_observer(&mut self, observer: Box<dyn RunObserver>) {
        self.observers.push(observer);
    }

    /// The static execution plan, without executing anything.
    pub fn plan(&self) -> PlanJson {
        report::assemble_plan(&self.registry)
    }

    /// Run all in-scope steps sequentially in declaration order.
    pub fn run_sequential(&self) -> RunReport {
        let scope = self.scoped_indices();
        let mut status_of: Vec<Option<StepStatus>> = vec![None; self.registry.len()];
        let mut results = Vec::with_capacity(scope.len());

        for &i in &scope {
            let step = &self.registry.steps()[i];
            let result = match self.unsatisfied_dep(i, &status_of, &scope) {
                Some(dep) => {
                    let result = StepResult::skip(
                        step,
                        format!("Skipped: dependency '{}' did not pass", dep),
                    );
                    self.notify_complete(step, &result);
                    result
                }
                None => {
                    self.notify_start(step);
                    let result = executor::execute(step);
                    self.notify_complete(step, &result);
                    result
                }
            };

            status_of[i] = Some(result.status);
            self.maybe_record_degradation(step, &result);
            results.push(result);
        }

        report::assemble(results, self.mode, None)
    }

    /// Run exactly one step by id, with its dependencies treated as
    /// satisfied. This is the operator escape hatch referenced by
    /// degradation-entry remediation commands.
    pub fn run_single(&self, id: &str) -> Result<RunReport> {
        let i = self
            .registry
            .index_of(id)
            .ok_or_else(|| SelfcheckError::UserError(format!("unknown step id '{}'", id)))?;

        let step = &self.registry.steps()[i];
        self.notify_start(step);
        let result = executor::execute(step);
        self.notify_complete(step, &result);
        self.maybe_record_degradation(step, &result);

        Ok(report::assemble(vec![result], self.mode, None))
    }

    /// Run wave-by-wave with a bounded worker pool.
    ///
    /// Steps within one wave run concurrently; waves themselves are strictly
    /// sequential, and a wave-0 (kernel) failure halts all subsequent waves
    /// unconditionally: their steps report SKIP without running.
    pub fn run_distributed(&self, workers: usize) -> Result<RunReport> {
        let workers = workers.max(1);
        let waves = plan_waves(&self.registry)?;
        let scope = self.scoped_indices();

        let run_start = Instant::now();
        let mut status_of: Vec<Option<StepStatus>> = vec![None; self.registry.len()];
        let mut all_results = Vec::new();
        let mut summaries = Vec::new();
        let mut halted = false;

        for wave in &waves {
            let in_scope: Vec<usize> = wave
                .steps
                .iter()
                .copied()
                .filter(|i| scope.contains(i))
                .collect();
            if in_scope.is_empty() {
                continue;
            }

            let wave_start = Instant::now();
            let results = if halted {
                in_scope
                    .iter()
                    .map(|&i| {
                        let step = &self.registry.steps()[i];
                        let result = StepResult::skip(
                            step,
                            "Skipped: kernel wave failed".to_string(),
                        );
                        self.notify_complete(step, &result);
                        result
                    })
                    .collect()
            } else {
                self.execute_wave(&in_scope, &status_of, &scope, workers)
            };

            for (&i, result) in in_scope.iter().zip(&results) {
                status_of[i] = Some(result.status);
                self.maybe_record_degradation(&self.registry.steps()[i], result);
            }

            let all_passed = results.iter().all(|r| r.status == StepStatus::Pass);
            // Only a kernel-wave failure halts the remaining waves; when the
            // registry declares no kernel tier, wave 0 holds ordinary steps.
            let kernel_wave = in_scope
                .iter()
                .any(|&i| self.registry.steps()[i].tier == Tier::Kernel);
            if kernel_wave && !all_passed {
                halted = true;
            }

            summaries.push(WaveSummary {
                wave: wave.index,
                steps: results.iter().map(|r| r.step_id.clone()).collect(),
                duration_ms: wave_start.elapsed().as_millis() as u64,
                all_passed,
                results: results.clone(),
            });
            all_results.extend(results);
        }

        let meta = WaveMetadata {
            waves: summaries,
            actual_duration_ms: run_start.elapsed().as_millis() as u64,
        };
        Ok(report::assemble(all_results, self.mode, Some(meta)))
    }

    /// Execute one wave's steps concurrently. Results come back in the
    /// wave's declaration order regardless of completion order.
    fn execute_wave(
        &self,
        indices: &[usize],
        status_of: &[Option<StepStatus>],
        scope: &[usize],
        workers: usize,
    ) -> Vec<StepResult> {
        let mut slots: Vec<Option<StepResult>> = vec![None; indices.len()];
        let mut runnable: VecDeque<(usize, usize)> = VecDeque::new();

        // Skip decisions are made before the pool starts, from the terminal
        // statuses of earlier waves. A dependency with no status yet shares
        // this wave (kernel on kernel) and runs concurrently, so it is
        // treated as satisfied.
        for (pos, &i) in indices.iter().enumerate() {
            let step = &self.registry.steps()[i];
            match self.failed_dep(i, status_of, scope) {
                Some(dep) => {
                    let result = StepResult::skip(
                        step,
                        format!("Skipped: dependency '{}' did not pass", dep),
                    );
                    self.notify_complete(step, &result);
                    slots[pos] = Some(result);
                }
                None => runnable.push_back((pos, i)),
            }
        }

        if !runnable.is_empty() {
            let pool_size = workers.min(runnable.len());
            let queue = Mutex::new(runnable);
            let (tx, rx) = mpsc::channel::<(usize, StepResult)>();

            thread::scope(|s| {
                for _ in 0..pool_size {
                    let tx = tx.clone();
                    let queue = &queue;
                    s.spawn(move || {
                        loop {
                            let job = queue.lock().expect("wave queue poisoned").pop_front();
                            let Some((pos, i)) = job else { break };
                            let step = &self.registry.steps()[i];
                            self.notify_start(step);
                            let result = executor::execute(step);
                            self.notify_complete(step, &result);
                            if tx.send((pos, result)).is_err() {
                                break;
                            }
                        }
                    });
                }
                drop(tx);

                for (pos, result) in rx {
                    slots[pos] = Some(result);
                }
            });
        }

        slots.into_iter().flatten().collect()
    }

    /// Indices of steps in scope for this run's mode, in declaration order.
    fn scoped_indices(&self) -> Vec<usize> {
        self.registry
            .steps()
            .iter()
            .enumerate()
            .filter(|(_, s)| self.mode != RunMode::KernelOnly || s.tier == Tier::Kernel)
            .map(|(i, _)| i)
            .collect()
    }

    /// First dependency of step `i` that did not PASS, if any. Dependencies
    /// outside the working set (excluded by kernel-only mode) are treated as
    /// satisfied. A dependency with no status yet counts as unsatisfied:
    /// sequential order is declaration order, so a forward-declared
    /// dependency has not passed when its dependent is reached.
    fn unsatisfied_dep(
        &self,
        i: usize,
        status_of: &[Option<StepStatus>],
        scope: &[usize],
    ) -> Option<&str> {
        for &d in self.registry.dep_indices(i) {
            if !scope.contains(&d) {
                continue;
            }
            if status_of[d] != Some(StepStatus::Pass) {
                return Some(self.registry.steps()[d].id.as_str());
            }
        }
        None
    }

    /// First dependency of step `i` with a terminal status other than PASS.
    /// Unlike [`unsatisfied_dep`](Self::unsatisfied_dep), a dependency with
    /// no status yet is treated as satisfied: in wave execution it can only
    /// be a same-wave kernel step running concurrently.
    fn failed_dep(
        &self,
        i: usize,
        status_of: &[Option<StepStatus>],
        scope: &[usize],
    ) -> Option<&str> {
        for &d in self.registry.dep_indices(i) {
            if !scope.contains(&d) {
                continue;
            }
            if let Some(status) = status_of[d]
                && status != StepStatus::Pass
            {
                return Some(self.registry.steps()[d].id.as_str());
            }
        }
        None
    }

    /// Record a degradation when the mode and result qualify. Log write
    /// failures are diagnostic only: warn and continue.
    fn maybe_record_degradation(&self, step: &Step, result: &StepResult) {
        if self.mode != RunMode::Degraded
            || result.status == StepStatus::Pass
            || step.tier == Tier::Kernel
        {
            return;
        }
        if let Some(logger) = &self.logger
            && let Err(e) = logger.record(step, result, self.mode)
        {
            eprintln!("warning: {}", e);
        }
    }

    fn notify_start(&self, step: &Step) {
        for observer in &self.observers {
            let _ = catch_unwind(AssertUnwindSafe(|| observer.on_step_start(step)));
        }
    }

    fn notify_complete(&self, step: &Step, result: &StepResult) {
        for observer in &self.observers {
            let _ = catch_unwind(AssertUnwindSafe(|| {
                observer.on_step_complete(step, result)
            }));
        }
    }
}
