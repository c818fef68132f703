//! # Step Worker
//!
//! Owns the full lifecycle of one step within one execution: the duplicate
//! probe, the executor call, the retry loop with cancellable backoff, and
//! every status transition along the way. Transitions are recorded through
//! the attempt store and the execution's status map *before* the worker
//! proceeds, so concurrent schedulers and the duplicate probe always see
//! the current state.

use crate::events::{EventPublisher, JobflowEvent};
use crate::executor::StepOutcome;
use crate::models::{Execution, Step, StepAttempt, StepId};
use crate::orchestration::cancellation::CancellationContext;
use crate::registry::ExecutorRegistry;
use crate::state_machine::StepStatus;
use crate::store::AttemptStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Shared services a worker needs, cloned per spawned step.
#[derive(Clone)]
pub struct StepWorkerContext {
    pub execution: Arc<Execution>,
    pub store: Arc<dyn AttemptStore>,
    pub executors: Arc<ExecutorRegistry>,
    pub events: EventPublisher,
    pub cancellation: Arc<CancellationContext>,
    pub duplicate_lookback: Duration,
}

impl StepWorkerContext {
    /// Record a terminal status for a step that never ran (skipped,
    /// stopped before start). Used by the orchestrators; running steps are
    /// recorded by their own worker.
    pub async fn record_unstarted(
        &self,
        step_id: &StepId,
        status: StepStatus,
        message: Option<String>,
        stopped_by: Option<String>,
    ) {
        let attempt = StepAttempt::unstarted(
            self.execution.id,
            step_id.clone(),
            0,
            status,
            message,
            stopped_by,
        );
        self.record_transition(&attempt).await;
    }

    /// Persist an attempt transition, update the status map, and publish
    /// the lifecycle event. A store failure is logged and the run
    /// continues best-effort.
    pub(crate) async fn record_transition(&self, attempt: &StepAttempt) {
        if let Err(error) = self.store.record(attempt).await {
            warn!(
                execution_id = %attempt.execution_id,
                step_id = %attempt.step_id,
                attempt = attempt.attempt,
                error = %error,
                "Failed to persist attempt transition, continuing"
            );
        }
        self.execution.set_status(&attempt.step_id, attempt.status);
        self.events.publish(JobflowEvent::StepTransition {
            execution_id: attempt.execution_id,
            step_id: attempt.step_id.clone(),
            attempt: attempt.attempt,
            status: attempt.status,
            message: attempt.message.clone(),
        });
    }
}

/// Acquire a parallelism slot, giving up when the execution is cancelled
/// while waiting.
pub(crate) async fn acquire_slot(
    semaphore: &Arc<Semaphore>,
    token: &CancellationToken,
) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        permit = semaphore.clone().acquire_owned() => permit.ok(),
    }
}

/// Spawn a worker for `step` into `join_set`, carrying its parallelism
/// permit for the lifetime of the run.
pub(crate) fn spawn_worker(
    join_set: &mut tokio::task::JoinSet<(StepId, StepStatus)>,
    ctx: StepWorkerContext,
    step: Arc<Step>,
    permit: OwnedSemaphorePermit,
) {
    let step_id = step.id.clone();
    join_set.spawn(async move {
        let _permit = permit;
        let status = StepWorker::new(ctx, step).run().await;
        (step_id, status)
    });
}

/// How one executor invocation ended, before retry policy is applied.
enum AttemptOutcome {
    Finished(StepOutcome),
    Cancelled,
    TimedOut(Duration),
}

/// Drives one step of one execution to a terminal status.
pub struct StepWorker {
    ctx: StepWorkerContext,
    step: Arc<Step>,
}

impl StepWorker {
    pub fn new(ctx: StepWorkerContext, step: Arc<Step>) -> Self {
        Self { ctx, step }
    }

    /// Run the step to a terminal status.
    #[instrument(
        skip(self),
        fields(execution_id = %self.ctx.execution.id, step_id = %self.step.id)
    )]
    pub async fn run(self) -> StepStatus {
        let token = self.ctx.cancellation.step_token(&self.step.id);

        // Cancelled before the first attempt: never touch the executor.
        if token.is_cancelled() {
            let stopped_by = self.ctx.cancellation.stopping_principal(&self.step.id);
            self.ctx
                .record_unstarted(
                    &self.step.id,
                    StepStatus::Stopped,
                    Some("cancelled before start".to_string()),
                    Some(stopped_by),
                )
                .await;
            return StepStatus::Stopped;
        }

        if self.is_duplicate().await {
            self.ctx
                .record_unstarted(
                    &self.step.id,
                    StepStatus::Duplicate,
                    Some(format!(
                        "another attempt of step '{}' is already running",
                        self.step.id
                    )),
                    None,
                )
                .await;
            return StepStatus::Duplicate;
        }

        let max_retries = self.step.retry.max_retries;
        let mut attempt_index = 0u32;
        loop {
            let mut attempt =
                StepAttempt::begin(self.ctx.execution.id, self.step.id.clone(), attempt_index);
            self.ctx.record_transition(&attempt).await;
            debug!(attempt = attempt_index, "Starting step attempt");

            let failure_message = match self.execute_attempt(&token).await {
                AttemptOutcome::Cancelled => {
                    attempt.stop(self.ctx.cancellation.stopping_principal(&self.step.id));
                    self.ctx.record_transition(&attempt).await;
                    return StepStatus::Stopped;
                }
                AttemptOutcome::Finished(StepOutcome::Succeeded) => {
                    attempt.finish(StepStatus::Succeeded, None);
                    self.ctx.record_transition(&attempt).await;
                    info!(attempt = attempt_index, "Step succeeded");
                    return StepStatus::Succeeded;
                }
                AttemptOutcome::Finished(StepOutcome::Warning(message)) => {
                    attempt.finish(StepStatus::Warning, Some(message));
                    self.ctx.record_transition(&attempt).await;
                    info!(attempt = attempt_index, "Step succeeded with warning");
                    return StepStatus::Warning;
                }
                AttemptOutcome::Finished(StepOutcome::Failed(message)) => message,
                AttemptOutcome::TimedOut(limit) => {
                    format!("attempt timed out after {}s", limit.as_secs())
                }
            };

            if attempt_index < max_retries {
                attempt.finish(StepStatus::AwaitingRetry, Some(failure_message.clone()));
                self.ctx.record_transition(&attempt).await;
                warn!(
                    attempt = attempt_index,
                    error = %failure_message,
                    retry_in_secs = self.step.retry.retry_interval.as_secs(),
                    "Step attempt failed, retry scheduled"
                );

                // Backoff is cancellable: a cancellation here yields a
                // Stopped attempt, not another retry.
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        let stopped = StepAttempt::unstarted(
                            self.ctx.execution.id,
                            self.step.id.clone(),
                            attempt_index + 1,
                            StepStatus::Stopped,
                            Some("cancelled while awaiting retry".to_string()),
                            Some(self.ctx.cancellation.stopping_principal(&self.step.id)),
                        );
                        self.ctx.record_transition(&stopped).await;
                        return StepStatus::Stopped;
                    }
                    _ = tokio::time::sleep(self.step.retry.retry_interval) => {}
                }
                attempt_index += 1;
            } else {
                attempt.finish(StepStatus::Failed, Some(failure_message.clone()));
                self.ctx.record_transition(&attempt).await;
                warn!(
                    attempt = attempt_index,
                    error = %failure_message,
                    "Step failed, retries exhausted"
                );
                return StepStatus::Failed;
            }
        }
    }

    /// Whether another attempt of this step is already running somewhere in
    /// the recent window. A probe failure is logged and treated as "no";
    /// refusing every step because the store is down would be worse than
    /// the rare double run.
    async fn is_duplicate(&self) -> bool {
        match self
            .ctx
            .store
            .is_step_running(&self.step.id, self.ctx.duplicate_lookback)
            .await
        {
            Ok(running) => running,
            Err(error) => {
                warn!(error = %error, "Duplicate probe failed, assuming not duplicate");
                false
            }
        }
    }

    /// One executor invocation under the step token and optional timeout.
    async fn execute_attempt(&self, token: &CancellationToken) -> AttemptOutcome {
        let executor = match self.ctx.executors.resolve(self.step.step_type) {
            Ok(executor) => executor,
            // Admission validates executors exist; reaching this means the
            // registry changed under us, so surface it as a step failure.
            Err(error) => return AttemptOutcome::Finished(StepOutcome::Failed(error.to_string())),
        };

        match self.step.timeout {
            Some(limit) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => AttemptOutcome::Cancelled,
                    result = tokio::time::timeout(limit, executor.execute(&self.step, token)) => {
                        match result {
                            Ok(Ok(outcome)) => AttemptOutcome::Finished(outcome),
                            Ok(Err(error)) => {
                                AttemptOutcome::Finished(StepOutcome::Failed(error.to_string()))
                            }
                            Err(_) => AttemptOutcome::TimedOut(limit),
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => AttemptOutcome::Cancelled,
                    result = executor.execute(&self.step, token) => {
                        match result {
                            Ok(outcome) => AttemptOutcome::Finished(outcome),
                            Err(error) => {
                                AttemptOutcome::Finished(StepOutcome::Failed(error.to_string()))
                            }
                        }
                    }
                }
            }
        }
    }
}
