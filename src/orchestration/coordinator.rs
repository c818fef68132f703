//! # Execution Coordinator
//!
//! Conducts one execution end to end: refuses cyclic dependency graphs
//! before any worker starts, selects the strategy for the execution's
//! mode, and settles the final status with the event channel and the
//! notifier once every step is terminal.

use crate::config::JobflowConfig;
use crate::events::{EventPublisher, ExecutionNotifier, ExecutionSummary, JobflowEvent};
use crate::graph::DependencyGraph;
use crate::models::{Execution, ExecutionMode};
use crate::orchestration::cancellation::CancellationContext;
use crate::orchestration::dependency_orchestrator::DependencyOrchestrator;
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::phase_orchestrator::PhaseOrchestrator;
use crate::orchestration::step_worker::StepWorkerContext;
use crate::registry::ExecutorRegistry;
use crate::state_machine::ExecutionStatus;
use crate::store::AttemptStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

/// Drives one execution to its final status.
pub struct ExecutionCoordinator {
    execution: Arc<Execution>,
    ctx: StepWorkerContext,
    semaphore: Arc<Semaphore>,
    notifier: Arc<dyn ExecutionNotifier>,
}

impl ExecutionCoordinator {
    pub fn new(
        execution: Arc<Execution>,
        cancellation: Arc<CancellationContext>,
        store: Arc<dyn AttemptStore>,
        executors: Arc<ExecutorRegistry>,
        events: EventPublisher,
        notifier: Arc<dyn ExecutionNotifier>,
        config: &JobflowConfig,
    ) -> Self {
        let parallelism = execution
            .max_parallel_steps
            .unwrap_or(config.execution.default_max_parallel_steps)
            .max(1);
        let ctx = StepWorkerContext {
            execution: execution.clone(),
            store,
            executors,
            events,
            cancellation,
            duplicate_lookback: config.duplicate_lookback(),
        };
        Self {
            execution,
            ctx,
            semaphore: Arc::new(Semaphore::new(parallelism)),
            notifier,
        }
    }

    /// Run every step of the execution to terminal status.
    ///
    /// Structural refusals (cyclic dependencies) return an error with no
    /// partial work performed; the notifier still receives a failed
    /// summary so downstream alerting fires either way.
    #[instrument(skip(self), fields(execution_id = %self.execution.id, job_id = %self.execution.job_id))]
    pub async fn run(&self) -> OrchestrationResult<ExecutionStatus> {
        self.execution.mark_started();
        self.ctx.events.publish(JobflowEvent::ExecutionStarted {
            execution_id: self.execution.id,
            job_id: self.execution.job_id.clone(),
            mode: self.execution.mode,
        });
        info!(mode = %self.execution.mode, steps = self.execution.steps().len(), "Starting execution");

        if self.execution.mode == ExecutionMode::DependencyBased {
            let cycles = DependencyGraph::from_steps(self.execution.steps()).cycles();
            if !cycles.is_empty() {
                let refusal = OrchestrationError::CyclicDependencies { cycles };
                error!(error = %refusal, "Refusing execution");
                self.settle(ExecutionStatus::Failed).await;
                return Err(refusal);
            }
        }

        let status = match self.execution.mode {
            ExecutionMode::PhaseBased => {
                PhaseOrchestrator::new(self.ctx.clone(), self.semaphore.clone())
                    .run()
                    .await
            }
            ExecutionMode::DependencyBased => {
                DependencyOrchestrator::new(self.ctx.clone(), self.semaphore.clone())
                    .run()
                    .await
            }
        };

        info!(status = %status, "Execution finished");
        self.settle(status).await;
        Ok(status)
    }

    async fn settle(&self, status: ExecutionStatus) {
        self.ctx.events.publish(JobflowEvent::ExecutionFinished {
            execution_id: self.execution.id,
            job_id: self.execution.job_id.clone(),
            status,
        });
        let summary = ExecutionSummary {
            execution_id: self.execution.id,
            job_id: self.execution.job_id.clone(),
            status,
            finished_at: chrono::Utc::now(),
            step_statuses: self.execution.statuses_snapshot(),
        };
        self.notifier.execution_finished(&summary).await;
    }
}
