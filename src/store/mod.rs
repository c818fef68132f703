//! # Attempt Store
//!
//! Persistence seam for step attempts. The orchestration core records
//! every attempt transition through this trait before proceeding, so the
//! current status of any step is externally observable at all times — other
//! steps and other executions depend on it for scheduling and duplicate
//! detection.
//!
//! A write failure here is logged and the run continues best-effort; it
//! must never crash the orchestrator, but it is a correctness risk that
//! deserves external monitoring.

pub mod memory;

pub use memory::InMemoryAttemptStore;

use crate::models::{ExecutionId, StepAttempt, StepId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by an attempt store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Attempt store unavailable: {0}")]
    Unavailable(String),

    #[error("Attempt store write failed: {0}")]
    WriteFailed(String),
}

/// Durable record of step attempts plus the duplicate-detection probe.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Record the current state of an attempt, replacing any earlier record
    /// of the same `(execution, step, attempt)` triple. Called on every
    /// transition, not just on completion.
    async fn record(&self, attempt: &StepAttempt) -> Result<(), StoreError>;

    /// Whether any execution has a currently `Running` attempt of this step
    /// that started within the lookback window. Powers duplicate detection:
    /// the same step can be triggered manually, on schedule, and through a
    /// sub-job at once, and running a side-effecting action twice
    /// concurrently is unsafe for most step types.
    async fn is_step_running(
        &self,
        step_id: &StepId,
        lookback: Duration,
    ) -> Result<bool, StoreError>;

    /// Attempt history of one step within one execution, ordered by attempt
    /// index.
    async fn attempts(
        &self,
        execution_id: ExecutionId,
        step_id: &StepId,
    ) -> Result<Vec<StepAttempt>, StoreError>;
}
