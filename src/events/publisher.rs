//! Broadcast publisher for orchestration lifecycle events.

use crate::constants::{events, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::models::{ExecutionId, ExecutionMode, StepId};
use crate::state_machine::{ExecutionStatus, StepStatus};
use serde::Serialize;
use tokio::sync::broadcast;

/// Orchestration lifecycle event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobflowEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        job_id: String,
        mode: ExecutionMode,
    },
    ExecutionFinished {
        execution_id: ExecutionId,
        job_id: String,
        status: ExecutionStatus,
    },
    ExecutionCancelled {
        execution_id: ExecutionId,
        cancelled_by: String,
        step_id: Option<StepId>,
    },
    StepTransition {
        execution_id: ExecutionId,
        step_id: StepId,
        attempt: u32,
        status: StepStatus,
        message: Option<String>,
    },
}

impl JobflowEvent {
    /// Stable event name, used as the envelope name and in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecutionStarted { .. } => events::EXECUTION_STARTED,
            Self::ExecutionFinished { .. } => events::EXECUTION_FINISHED,
            Self::ExecutionCancelled { .. } => events::EXECUTION_CANCELLED,
            Self::StepTransition { status, .. } => match status {
                StepStatus::Running | StepStatus::NotStarted => events::STEP_STARTED,
                StepStatus::AwaitingRetry => events::STEP_RETRY_SCHEDULED,
                StepStatus::Succeeded | StepStatus::Warning => events::STEP_SUCCEEDED,
                StepStatus::Failed => events::STEP_FAILED,
                StepStatus::Stopped => events::STEP_STOPPED,
                StepStatus::Skipped => events::STEP_SKIPPED,
                StepStatus::Duplicate => events::STEP_DUPLICATE,
            },
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub event: JobflowEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// High-throughput event publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Events are fire-and-forget: publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: JobflowEvent) {
        let published = PublishedEvent {
            name: event.name().to_string(),
            event,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(published);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
