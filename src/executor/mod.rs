//! # Step Executors
//!
//! The delegation seam between the orchestration core and the systems that
//! actually run step actions. The core handles scheduling, retries, and
//! cancellation; executors only run one step and report how it went.
//!
//! Executors are expected to absorb transient remote hiccups internally
//! (a few retries around a flaky status poll); the core's retry policy is
//! spent on whole-step failures only. Cancellation is cooperative: an
//! executor should observe its token promptly, and one that ignores it is
//! contained by the worker dropping its future or by the step timeout.

use crate::models::Step;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result an executor reports for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The step's action completed.
    Succeeded,
    /// The action completed but something deserves attention.
    Warning(String),
    /// The action failed; the message feeds the attempt record and logs.
    Failed(String),
}

/// Infrastructure failure inside an executor.
///
/// The step worker treats this the same as [`StepOutcome::Failed`] — a
/// business failure with the message captured — never as a crash of the
/// worker itself.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One capability: run a step and report the result.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        token: &CancellationToken,
    ) -> Result<StepOutcome, ExecutorError>;
}
