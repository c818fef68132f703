//! # Events & Notifications
//!
//! Lifecycle event broadcasting for in-process observers, and the
//! notification seam invoked once per execution with its final status.

pub mod publisher;

pub use publisher::{EventPublisher, JobflowEvent, PublishedEvent};

use crate::models::{ExecutionId, StepId};
use crate::state_machine::{ExecutionStatus, StepStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Final report of one execution, handed to the notifier exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: ExecutionId,
    pub job_id: String,
    pub status: ExecutionStatus,
    pub finished_at: DateTime<Utc>,
    pub step_statuses: HashMap<StepId, StepStatus>,
}

/// Notification collaborator (mail, chat, webhook...). Called once per
/// execution with the final status, independent of the engine's internals.
#[async_trait]
pub trait ExecutionNotifier: Send + Sync {
    async fn execution_finished(&self, summary: &ExecutionSummary);
}

/// Notifier that only writes a structured log line.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ExecutionNotifier for LoggingNotifier {
    async fn execution_finished(&self, summary: &ExecutionSummary) {
        info!(
            execution_id = %summary.execution_id,
            job_id = %summary.job_id,
            status = %summary.status,
            steps = summary.step_statuses.len(),
            "Execution finished"
        );
    }
}
