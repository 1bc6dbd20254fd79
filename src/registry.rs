//! Step registry: the validated arena of steps for one run.
//!
//! The registry owns the declarative step list in declaration order, indexes
//! steps by id, and resolves dependency edges to indices once at load time so
//! the scheduler never re-resolves ids by string. Validation catches duplicate
//! ids, dangling dependency references, and dependency cycles before anything
//! executes.

use crate::error::{Result, SelfcheckError};
use crate::step::{Step, StepSpec};
use std::collections::HashMap;

/// Validated arena of steps indexed by id.
#[derive(Debug, Clone)]
pub struct Registry {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    /// Dependency edges resolved to indices, parallel to `steps`.
    deps: Vec<Vec<usize>>,
}

impl Registry {
    /// Load and validate a registry from declarative specs.
    ///
    /// Malformed individual specs (missing id/command/tier, invalid enum
    /// values) are rejected by the `Step` factory; structural problems
    /// (duplicates, dangling or circular dependencies) are collected by
    /// [`validate_steps`] and reported together.
    pub fn load(specs: &[StepSpec]) -> Result<Self> {
        let steps: Vec<Step> = specs
            .iter()
            .map(Step::from_spec)
            .collect::<Result<Vec<_>>>()?;

        let errors = validate_steps(&steps);
        if !errors.is_empty() {
            return Err(SelfcheckError::ConfigError(errors.join("; ")));
        }

        let index: HashMap<String, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let deps = steps
            .iter()
            .map(|s| s.dependencies.iter().map(|d| index[d]).collect())
            .collect();

        Ok(Self { steps, index, deps })
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the registry holds no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by id.
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Index of a step by id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Resolved dependency indices for the step at `i`.
    pub fn dep_indices(&self, i: usize) -> &[usize] {
        &self.deps[i]
    }
}

/// Pure structural validation over a step list.
///
/// Returns one message per problem found; an empty vector means the set is
/// structurally sound. Detects duplicate ids, dependencies referencing
/// unknown ids, and circular dependencies.
pub fn validate_steps(steps: &[Step]) -> Vec<String> {
    let mut errors = Vec::new();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for step in steps {
        *seen.entry(step.id.as_str()).or_insert(0) += 1;
    }
    let mut dupes: Vec<&&str> = seen.iter().filter(|&(_, &n)| n > 1).map(|(id, _)| id).collect();
    dupes.sort();
    for id in dupes {
        errors.push(format!("duplicate step id '{}'", id));
    }

    for step in steps {
        for dep in &step.dependencies {
            if !seen.contains_key(dep.as_str()) {
                errors.push(format!(
                    "step '{}' has invalid dependency '{}' (no such step)",
                    step.id, dep
                ));
            }
        }
    }

    if let Some(cycle) = find_cycle(steps) {
        errors.push(format!("Circular dependency detected: {}", cycle.join(" -> ")));
    }

    errors
}

/// Depth-first cycle search over the dependency graph.
///
/// Unresolvable dependency ids are ignored here; they are reported separately
/// as dangling references. Returns the ids along the first cycle found.
fn find_cycle(steps: &[Step]) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    // 0 = unvisited, 1 = on the current path, 2 = done
    let mut state = vec![0u8; steps.len()];
    let mut path: Vec<usize> = Vec::new();

    fn visit(
        i: usize,
        steps: &[Step],
        index: &HashMap<&str, usize>,
        state: &mut [u8],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        state[i] = 1;
        path.push(i);

        for dep in &steps[i].dependencies {
            let Some(&j) = index.get(dep.as_str()) else {
                continue;
            };
            match state[j] {
                1 => {
                    // Found a back edge; report the cycle portion of the path.
                    let start = path.iter().position(|&p| p == j).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&p| steps[p].id.clone()).collect();
                    cycle.push(steps[j].id.clone());
                    return Some(cycle);
                }
                0 => {
                    if let Some(cycle) = visit(j, steps, index, state, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        state[i] = 2;
        None
    }

    for i in 0..steps.len() {
        if state[i] == 0
            && let Some(cycle) = visit(i, steps, &index, &mut state, &mut path)
        {
            return Some(cycle);
        }
    }

    None
}
