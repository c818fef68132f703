//! One run of a job: a fixed snapshot of steps plus the mutable per-step
//! status map. Created once, mutated throughout the run, never reused.

use crate::models::step::{Step, StepId};
use crate::state_machine::{ExecutionStatus, StepStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Strategy used to order step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Steps grouped by integer phase, executed in full barriers.
    PhaseBased,
    /// Steps executed as soon as their dependencies resolve, with skip
    /// cascades on strict failures.
    DependencyBased,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PhaseBased => write!(f, "phase_based"),
            Self::DependencyBased => write!(f, "dependency_based"),
        }
    }
}

/// One run of a job's steps.
///
/// The execution owns its status map exclusively for its lifetime;
/// orchestrators and workers hold `Arc` references to the step snapshot
/// but never mutate it.
#[derive(Debug)]
pub struct Execution {
    pub id: ExecutionId,
    pub job_id: String,
    pub mode: ExecutionMode,
    /// Per-job bound on concurrently running steps; service default applies
    /// when absent.
    pub max_parallel_steps: Option<usize>,
    /// Phase-based only: end the run early once a completed phase contains
    /// a failed step.
    pub stop_on_first_error: bool,
    pub created_at: DateTime<Utc>,
    started_at: parking_lot::Mutex<Option<DateTime<Utc>>>,
    steps: Vec<Arc<Step>>,
    statuses: DashMap<StepId, StepStatus>,
}

impl Execution {
    pub fn new(
        job_id: impl Into<String>,
        mode: ExecutionMode,
        steps: Vec<Arc<Step>>,
        max_parallel_steps: Option<usize>,
        stop_on_first_error: bool,
    ) -> Self {
        let statuses = steps
            .iter()
            .map(|s| (s.id.clone(), StepStatus::NotStarted))
            .collect();
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.into(),
            mode,
            max_parallel_steps,
            stop_on_first_error,
            created_at: Utc::now(),
            started_at: parking_lot::Mutex::new(None),
            steps,
            statuses,
        }
    }

    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    pub fn step(&self, id: &StepId) -> Option<&Arc<Step>> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Whether the given step id is part of this execution's snapshot.
    ///
    /// Dependency edges pointing outside the snapshot (filtered-out steps)
    /// are treated as satisfied by the orchestrators.
    pub fn contains(&self, id: &StepId) -> bool {
        self.statuses.contains_key(id)
    }

    pub fn status_of(&self, id: &StepId) -> StepStatus {
        self.statuses
            .get(id)
            .map(|s| *s.value())
            .unwrap_or(StepStatus::NotStarted)
    }

    pub fn set_status(&self, id: &StepId, status: StepStatus) {
        self.statuses.insert(id.clone(), status);
    }

    /// Steps of this execution still waiting for a scheduling decision.
    pub fn not_started_steps(&self) -> Vec<Arc<Step>> {
        self.steps
            .iter()
            .filter(|s| self.status_of(&s.id) == StepStatus::NotStarted)
            .cloned()
            .collect()
    }

    pub fn statuses_snapshot(&self) -> HashMap<StepId, StepStatus> {
        self.statuses
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn mark_started(&self) {
        *self.started_at.lock() = Some(Utc::now());
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock()
    }

    /// Worst-case aggregate of the current step statuses.
    pub fn roll_up(&self) -> ExecutionStatus {
        ExecutionStatus::roll_up(self.statuses.iter().map(|e| *e.value()))
    }

    /// Point-in-time view for the query API.
    pub fn snapshot(&self, include_steps: bool) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.id,
            job_id: self.job_id.clone(),
            mode: self.mode,
            created_at: self.created_at,
            started_at: self.started_at(),
            status: self.roll_up(),
            steps: include_steps.then(|| {
                self.steps
                    .iter()
                    .map(|s| StepStatusEntry {
                        step_id: s.id.clone(),
                        name: s.name.clone(),
                        status: self.status_of(&s.id),
                    })
                    .collect()
            }),
        }
    }
}

/// Point-in-time view of an execution for callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: ExecutionId,
    pub job_id: String,
    pub mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub steps: Option<Vec<StepStatusEntry>>,
}

/// Per-step entry of an [`ExecutionSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatusEntry {
    pub step_id: StepId,
    pub name: String,
    pub status: StepStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::step::StepType;

    fn sample_execution() -> Execution {
        let steps = vec![
            Arc::new(Step::new("a", "A", StepType::Sql)),
            Arc::new(Step::new("b", "B", StepType::Pipeline)),
        ];
        Execution::new("job-1", ExecutionMode::PhaseBased, steps, None, false)
    }

    #[test]
    fn test_statuses_initialized_not_started() {
        let execution = sample_execution();
        assert_eq!(
            execution.status_of(&StepId::from("a")),
            StepStatus::NotStarted
        );
        assert_eq!(execution.roll_up(), ExecutionStatus::Running);
        assert_eq!(execution.not_started_steps().len(), 2);
    }

    #[test]
    fn test_snapshot_includes_steps_on_request() {
        let execution = sample_execution();
        execution.set_status(&StepId::from("a"), StepStatus::Succeeded);

        let bare = execution.snapshot(false);
        assert!(bare.steps.is_none());

        let detailed = execution.snapshot(true);
        let steps = detailed.steps.unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps
            .iter()
            .any(|s| s.step_id.as_str() == "a" && s.status == StepStatus::Succeeded));
    }
}
