//! One try of a step within an execution. Attempts are append-only; a new
//! attempt exists only because the previous one failed with retries
//! remaining, so the full sequence is an audit trail of the step's run.

use crate::models::execution::ExecutionId;
use crate::models::step::StepId;
use crate::state_machine::StepStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of a single step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAttempt {
    pub execution_id: ExecutionId,
    pub step_id: StepId,
    /// 0-based retry index; a step accumulates at most `max_retries + 1`
    /// attempts.
    pub attempt: u32,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error or warning message reported by the executor, or the skip
    /// explanation for attempts that never ran.
    pub message: Option<String>,
    /// Principal that cancelled the attempt, when `status` is `Stopped`.
    pub stopped_by: Option<String>,
}

impl StepAttempt {
    /// Start a new running attempt.
    pub fn begin(execution_id: ExecutionId, step_id: StepId, attempt: u32) -> Self {
        Self {
            execution_id,
            step_id,
            attempt,
            status: StepStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            message: None,
            stopped_by: None,
        }
    }

    /// Record an attempt that terminated without ever invoking the
    /// executor (skipped, duplicate, or stopped before start).
    pub fn unstarted(
        execution_id: ExecutionId,
        step_id: StepId,
        attempt: u32,
        status: StepStatus,
        message: Option<String>,
        stopped_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            execution_id,
            step_id,
            attempt,
            status,
            started_at: now,
            finished_at: Some(now),
            message,
            stopped_by,
        }
    }

    /// Transition this attempt to a settled status.
    pub fn finish(&mut self, status: StepStatus, message: Option<String>) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.message = message;
    }

    /// Transition this attempt to `Stopped`, recording who cancelled it.
    pub fn stop(&mut self, stopped_by: impl Into<String>) {
        self.status = StepStatus::Stopped;
        self.finished_at = Some(Utc::now());
        self.stopped_by = Some(stopped_by.into());
    }
}
