//! In-memory attempt store.
//!
//! Serves the single-process scope of the engine and doubles as the test
//! double; the duplicate-detection probe scans across all executions the
//! way a database-backed implementation would query them.

use crate::models::{ExecutionId, StepAttempt, StepId};
use crate::state_machine::StepStatus;
use crate::store::{AttemptStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;

/// Arena of attempts keyed by `(execution, step)`.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    attempts: DashMap<(ExecutionId, StepId), Vec<StepAttempt>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn record(&self, attempt: &StepAttempt) -> Result<(), StoreError> {
        let key = (attempt.execution_id, attempt.step_id.clone());
        let mut entry = self.attempts.entry(key).or_default();
        match entry.iter_mut().find(|a| a.attempt == attempt.attempt) {
            Some(existing) => *existing = attempt.clone(),
            None => entry.push(attempt.clone()),
        }
        Ok(())
    }

    async fn is_step_running(
        &self,
        step_id: &StepId,
        lookback: Duration,
    ) -> Result<bool, StoreError> {
        let horizon =
            Utc::now() - chrono::Duration::from_std(lookback).unwrap_or_else(|_| chrono::Duration::zero());
        let running = self.attempts.iter().any(|entry| {
            entry.key().1 == *step_id
                && entry
                    .value()
                    .iter()
                    .max_by_key(|a| a.attempt)
                    .is_some_and(|latest| {
                        latest.status == StepStatus::Running && latest.started_at >= horizon
                    })
        });
        Ok(running)
    }

    async fn attempts(
        &self,
        execution_id: ExecutionId,
        step_id: &StepId,
    ) -> Result<Vec<StepAttempt>, StoreError> {
        let mut attempts = self
            .attempts
            .get(&(execution_id, step_id.clone()))
            .map(|e| e.value().clone())
            .unwrap_or_default();
        attempts.sort_by_key(|a| a.attempt);
        Ok(attempts)
    }
}
