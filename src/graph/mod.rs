//! # Dependency Graph
//!
//! Pure data structure over a step set's declared dependencies, plus the
//! cycle detector that gates dependency-based execution. No I/O.

pub mod cycle_detector;

pub use cycle_detector::find_cycles;

use crate::models::{Step, StepId};
use std::collections::HashMap;
use std::sync::Arc;

/// Adjacency view over the dependency edges of one execution's step set.
///
/// Edges pointing at steps outside the set (filtered out of the execution)
/// are dropped; the orchestrator treats such dependencies as satisfied.
#[derive(Debug)]
pub struct DependencyGraph {
    edges: HashMap<StepId, Vec<StepId>>,
}

impl DependencyGraph {
    pub fn from_steps(steps: &[Arc<Step>]) -> Self {
        let known: HashMap<&StepId, ()> = steps.iter().map(|s| (&s.id, ())).collect();
        let edges = steps
            .iter()
            .map(|step| {
                let deps = step
                    .depends_on
                    .iter()
                    .filter(|edge| known.contains_key(&edge.step_id))
                    .map(|edge| edge.step_id.clone())
                    .collect();
                (step.id.clone(), deps)
            })
            .collect();
        Self { edges }
    }

    pub fn dependencies_of(&self, id: &StepId) -> &[StepId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All dependency cycles in the graph; empty means acyclic.
    pub fn cycles(&self) -> Vec<Vec<StepId>> {
        find_cycles(self.edges.keys().cloned(), |id| {
            self.dependencies_of(id).to_vec()
        })
    }
}
