//! Wave planner for distributed execution.
//!
//! Partitions the registry into ordered waves by topological layering:
//! wave 0 is all KERNEL steps (kernel is definitionally first), and each
//! subsequent wave is the batch of not-yet-placed steps whose dependencies
//! all live in earlier waves. Steps within one wave have no dependencies on
//! each other and may run concurrently.

use crate::error::{Result, SelfcheckError};
use crate::registry::Registry;
use crate::step::Tier;

/// An ordered group of step indices with no intra-group dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    /// Zero-based wave number.
    pub index: usize,
    /// Indices into the registry's step list, in declaration order.
    pub steps: Vec<usize>,
}

impl Wave {
    /// Step ids in this wave, in declaration order.
    pub fn step_ids<'a>(&self, registry: &'a Registry) -> Vec<&'a str> {
        self.steps
            .iter()
            .map(|&i| registry.steps()[i].id.as_str())
            .collect()
    }
}

/// Partition the registry into execution waves.
///
/// Registry validation has already rejected cycles, but placement is
/// re-checked independently here: if no progress can be made while steps
/// remain unplaced, or a dependency of a later-wave step does not land in a
/// strictly earlier wave, a `PlanningError` is returned. Kernel steps go
/// into wave 0 regardless of their declared dependencies; the earlier-wave
/// invariant applies to waves after the first, so a kernel step depending on
/// another kernel step still plans (both share wave 0 and run concurrently).
pub fn plan_waves(registry: &Registry) -> Result<Vec<Wave>> {
    let steps = registry.steps();
    let mut placed = vec![false; steps.len()];
    let mut wave_of = vec![usize::MAX; steps.len()];
    let mut waves: Vec<Wave> = Vec::new();

    // Wave 0: exactly the kernel steps. Skipped entirely when the registry
    // declares no kernel tier, so wave numbering stays contiguous.
    let kernel: Vec<usize> = (0..steps.len())
        .filter(|&i| steps[i].tier == Tier::Kernel)
        .collect();
    if !kernel.is_empty() {
        for &i in &kernel {
            placed[i] = true;
            wave_of[i] = 0;
        }
        waves.push(Wave {
            index: 0,
            steps: kernel,
        });
    }

    // Subsequent waves: repeatedly collect every unplaced step whose
    // dependencies are all placed in earlier waves.
    while placed.iter().any(|&p| !p) {
        let ready: Vec<usize> = (0..steps.len())
            .filter(|&i| !placed[i])
            .filter(|&i| registry.dep_indices(i).iter().all(|&d| placed[d]))
            .collect();

        if ready.is_empty() {
            let stuck: Vec<&str> = (0..steps.len())
                .filter(|&i| !placed[i])
                .map(|i| steps[i].id.as_str())
                .collect();
            return Err(SelfcheckError::PlanningError(format!(
                "cannot place steps into waves (circular or unsatisfiable dependencies): {}",
                stuck.join(", ")
            )));
        }

        let index = waves.len();
        for &i in &ready {
            placed[i] = true;
            wave_of[i] = index;
        }
        waves.push(Wave { index, steps: ready });
    }

    // Structural invariant: for steps beyond the first wave, every dependency
    // sits in a strictly earlier wave. Wave 0 is exempt: kernel steps are
    // placed there definitionally, even when they depend on each other.
    for (i, step) in steps.iter().enumerate() {
        if wave_of[i] == 0 {
            continue;
        }
        for &d in registry.dep_indices(i) {
            if wave_of[d] >= wave_of[i] {
                return Err(SelfcheckError::PlanningError(format!(
                    "step '{}' (wave {}) depends on '{}' (wave {}), which is not an earlier wave",
                    step.id, wave_of[i], steps[d].id, wave_of[d]
                )));
            }
        }
    }

    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepSpec;

    fn registry(specs: Vec<StepSpec>) -> Registry {
        Registry::load(&specs).unwrap()
    }

    fn spec(id: &str, tier: &str, deps: &[&str]) -> StepSpec {
        let mut s = StepSpec::new(id, tier, "true");
        for d in deps {
            s = s.depends_on(d);
        }
        s
    }

    #[test]
    fn test_kernel_steps_form_wave_zero() {
        let r = registry(vec![
            spec("g", "governance", &[]),
            spec("k1", "kernel", &[]),
            spec("k2", "kernel", &[]),
        ]);
        let waves = plan_waves(&r).unwrap();

        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].step_ids(&r), vec!["k1", "k2"]);
        assert_eq!(waves[1].step_ids(&r), vec!["g"]);
    }

    #[test]
    fn test_every_step_in_exactly_one_wave() {
        let r = registry(vec![
            spec("k", "kernel", &[]),
            spec("a", "governance", &["k"]),
            spec("b", "governance", &["k"]),
            spec("c", "optional", &["a", "b"]),
            spec("d", "optional", &[]),
        ]);
        let waves = plan_waves(&r).unwrap();

        let mut seen = vec![0usize; r.len()];
        for wave in &waves {
            for &i in &wave.steps {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_dependencies_in_strictly_earlier_waves() {
        let r = registry(vec![
            spec("k", "kernel", &[]),
            spec("a", "governance", &["k"]),
            spec("b", "optional", &["a"]),
            spec("c", "optional", &["b"]),
        ]);
        let waves = plan_waves(&r).unwrap();

        let mut wave_of = std::collections::HashMap::new();
        for wave in &waves {
            for id in wave.step_ids(&r) {
                wave_of.insert(id.to_string(), wave.index);
            }
        }
        for (i, step) in r.steps().iter().enumerate() {
            for &d in r.dep_indices(i) {
                let dep_id = &r.steps()[d].id;
                assert!(wave_of[dep_id] < wave_of[&step.id]);
            }
        }
    }

    #[test]
    fn test_independent_steps_share_a_wave() {
        let r = registry(vec![
            spec("k", "kernel", &[]),
            spec("a", "governance", &["k"]),
            spec("b", "governance", &["k"]),
        ]);
        let waves = plan_waves(&r).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[1].step_ids(&r), vec!["a", "b"]);
    }

    #[test]
    fn test_no_kernel_tier_starts_at_wave_zero() {
        let r = registry(vec![
            spec("a", "governance", &[]),
            spec("b", "optional", &["a"]),
        ]);
        let waves = plan_waves(&r).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].index, 0);
        assert_eq!(waves[0].step_ids(&r), vec!["a"]);
        assert_eq!(waves[1].step_ids(&r), vec!["b"]);
    }

    #[test]
    fn test_kernel_dependency_on_kernel_shares_wave_zero() {
        // Kernel steps are placed into wave 0 regardless of declared
        // dependencies; every valid registry must be plannable.
        let r = registry(vec![
            spec("first", "kernel", &[]),
            spec("second", "kernel", &["first"]),
        ]);
        let waves = plan_waves(&r).unwrap();
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].step_ids(&r), vec!["first", "second"]);
    }

    #[test]
    fn test_kernel_dependency_does_not_break_later_waves() {
        let r = registry(vec![
            spec("first", "kernel", &[]),
            spec("second", "kernel", &["first"]),
            spec("g", "governance", &["second"]),
        ]);
        let waves = plan_waves(&r).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].step_ids(&r), vec!["first", "second"]);
        assert_eq!(waves[1].step_ids(&r), vec!["g"]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let r = registry(vec![
            spec("k", "kernel", &[]),
            spec("a", "governance", &["k"]),
            spec("b", "optional", &["a"]),
        ]);
        let first = plan_waves(&r).unwrap();
        let second = plan_waves(&r).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_registry_plans_to_no_waves() {
        let r = registry(vec![]);
        let waves = plan_waves(&r).unwrap();
        assert!(waves.is_empty());
    }
}
