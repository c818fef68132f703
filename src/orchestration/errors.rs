//! Structural and admission errors of the orchestration engine.
//!
//! Step business failures and skips never surface here; they are resolved
//! inside the orchestrators and drive scheduling decisions. Only errors
//! that refuse work before it starts (cycles, duplicate ids, unknown
//! entities) propagate to callers.

use crate::models::{ExecutionId, StepId};
use crate::registry::RegistryError;
use thiserror::Error;

/// Errors returned by the orchestration entry points.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The step set contains circular dependencies; nothing was executed.
    #[error("Circular dependencies detected: {}", render_cycles(.cycles))]
    CyclicDependencies { cycles: Vec<Vec<StepId>> },

    /// The execution id is already registered and running.
    #[error("Execution {execution_id} is already running")]
    DuplicateExecution { execution_id: ExecutionId },

    #[error("Execution {execution_id} not found")]
    ExecutionNotFound { execution_id: ExecutionId },

    #[error("Step '{step_id}' not found in execution {execution_id}")]
    StepNotFound {
        execution_id: ExecutionId,
        step_id: StepId,
    },

    #[error("Job '{job_id}' not found")]
    JobNotFound { job_id: String },

    /// The step filter selected nothing; an empty execution is refused.
    #[error("No steps selected for job '{job_id}'")]
    NoStepsSelected { job_id: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

fn render_cycles(cycles: &[Vec<StepId>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut names: Vec<&str> = cycle.iter().map(StepId::as_str).collect();
            if let Some(first) = names.first().copied() {
                names.push(first);
            }
            names.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
