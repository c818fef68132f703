//! # Execution Manager
//!
//! Process-wide registry of executions and the entry points the thin API
//! layer calls: create, start, cancel, query. Admission control bounds how
//! many executions run concurrently across all jobs, independent of each
//! job's own step parallelism. Registration is atomic with respect to
//! concurrent start requests for the same id, and every execution is
//! deregistered when it settles, however it settles.

use crate::config::JobflowConfig;
use crate::events::{EventPublisher, ExecutionNotifier, JobflowEvent, LoggingNotifier};
use crate::models::{Execution, ExecutionId, ExecutionSnapshot, StepFilter, StepId};
use crate::orchestration::cancellation::CancellationContext;
use crate::orchestration::coordinator::ExecutionCoordinator;
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::registry::{ExecutorRegistry, JobRegistry, RegistryError};
use crate::store::AttemptStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Created,
    Running,
}

/// One registered execution and its cancellation scope.
struct ExecutionHandle {
    execution: Arc<Execution>,
    cancellation: Arc<CancellationContext>,
    state: parking_lot::Mutex<RunState>,
    run_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Top-level orchestrator of all executions in the process.
#[derive(Clone)]
pub struct ExecutionManager {
    config: Arc<JobflowConfig>,
    jobs: Arc<JobRegistry>,
    executors: Arc<ExecutorRegistry>,
    store: Arc<dyn AttemptStore>,
    events: EventPublisher,
    notifier: Arc<dyn ExecutionNotifier>,
    shutdown: CancellationToken,
    admission: Arc<Semaphore>,
    executions: Arc<DashMap<ExecutionId, Arc<ExecutionHandle>>>,
}

impl ExecutionManager {
    pub fn new(
        config: JobflowConfig,
        jobs: Arc<JobRegistry>,
        executors: Arc<ExecutorRegistry>,
        store: Arc<dyn AttemptStore>,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(
            config.execution.max_concurrent_executions.max(1),
        ));
        let events = EventPublisher::new(config.events.channel_capacity);
        Self {
            config: Arc::new(config),
            jobs,
            executors,
            store,
            events,
            notifier: Arc::new(LoggingNotifier),
            shutdown: CancellationToken::new(),
            admission,
            executions: Arc::new(DashMap::new()),
        }
    }

    /// Replace the notifier invoked with each execution's final status.
    pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Lifecycle event channel for in-process observers.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Create an execution for a job, selecting steps through the filter.
    ///
    /// Structural admission checks happen here: the job must exist, the
    /// filter must select at least one step, and every selected step type
    /// must have a registered executor.
    #[instrument(skip(self, filter))]
    pub fn create_execution(
        &self,
        job_id: &str,
        filter: &StepFilter,
    ) -> OrchestrationResult<ExecutionId> {
        let job = self
            .jobs
            .resolve(job_id)
            .ok_or_else(|| OrchestrationError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        let steps: Vec<_> = job
            .steps
            .iter()
            .filter(|s| filter.matches(&s.id))
            .cloned()
            .collect();
        if steps.is_empty() {
            return Err(OrchestrationError::NoStepsSelected {
                job_id: job_id.to_string(),
            });
        }
        for step in &steps {
            if !self.executors.supports(step.step_type) {
                return Err(RegistryError::UnknownStepType {
                    step_type: step.step_type,
                }
                .into());
            }
        }

        let execution = Arc::new(Execution::new(
            job.job_id.clone(),
            job.mode,
            steps,
            job.max_parallel_steps,
            job.stop_on_first_error,
        ));
        let cancellation = Arc::new(CancellationContext::new(
            &self.shutdown,
            execution.steps().iter().map(|s| s.id.clone()),
        ));
        let id = execution.id;
        self.executions.insert(
            id,
            Arc::new(ExecutionHandle {
                execution,
                cancellation,
                state: parking_lot::Mutex::new(RunState::Created),
                run_handle: parking_lot::Mutex::new(None),
            }),
        );

        info!(execution_id = %id, job_id, "Execution created");
        Ok(id)
    }

    /// Start a created execution. Rejects ids that are unknown or already
    /// running; the registration flip is atomic, so two concurrent start
    /// requests for the same id cannot both win.
    pub fn start_execution(&self, execution_id: ExecutionId) -> OrchestrationResult<()> {
        let handle = self
            .executions
            .get(&execution_id)
            .map(|h| h.value().clone())
            .ok_or(OrchestrationError::ExecutionNotFound { execution_id })?;

        {
            let mut state = handle.state.lock();
            if *state == RunState::Running {
                return Err(OrchestrationError::DuplicateExecution { execution_id });
            }
            *state = RunState::Running;
        }

        let coordinator = ExecutionCoordinator::new(
            handle.execution.clone(),
            handle.cancellation.clone(),
            self.store.clone(),
            self.executors.clone(),
            self.events.clone(),
            self.notifier.clone(),
            &self.config,
        );
        let manager = self.clone();
        let run_handle = tokio::spawn(async move {
            // Admission across all jobs: queue for a process-wide slot
            // before any step of this execution runs.
            let _permit = match manager.admission.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(execution_id = %execution_id, "Admission semaphore closed");
                    manager.executions.remove(&execution_id);
                    return;
                }
            };
            match coordinator.run().await {
                Ok(status) => {
                    debug!(execution_id = %execution_id, status = %status, "Execution settled")
                }
                Err(e) => {
                    error!(execution_id = %execution_id, error = %e, "Execution refused")
                }
            }
            manager.executions.remove(&execution_id);
        });
        *handle.run_handle.lock() = Some(run_handle);

        info!(execution_id = %execution_id, "Execution started");
        Ok(())
    }

    /// Cancel a whole execution, or one step of it, on behalf of a user.
    pub fn cancel_execution(
        &self,
        execution_id: ExecutionId,
        username: &str,
        step_id: Option<&StepId>,
    ) -> OrchestrationResult<()> {
        let handle = self
            .executions
            .get(&execution_id)
            .map(|h| h.value().clone())
            .ok_or(OrchestrationError::ExecutionNotFound { execution_id })?;

        match step_id {
            Some(step_id) => {
                if !handle.cancellation.cancel_step(step_id, username) {
                    return Err(OrchestrationError::StepNotFound {
                        execution_id,
                        step_id: step_id.clone(),
                    });
                }
            }
            None => handle.cancellation.cancel_execution(username),
        }

        self.events.publish(JobflowEvent::ExecutionCancelled {
            execution_id,
            cancelled_by: username.to_string(),
            step_id: step_id.cloned(),
        });
        warn!(
            execution_id = %execution_id,
            cancelled_by = username,
            step_id = step_id.map(|s| s.as_str()).unwrap_or("<all>"),
            "Cancellation requested"
        );
        Ok(())
    }

    /// Snapshot of one active execution, or `None` once it settled.
    pub fn execution_status(&self, execution_id: ExecutionId) -> Option<ExecutionSnapshot> {
        self.executions
            .get(&execution_id)
            .map(|h| h.execution.snapshot(false))
    }

    /// Snapshots of all active executions.
    pub fn list_executions(&self, include_steps: bool) -> Vec<ExecutionSnapshot> {
        let mut snapshots: Vec<_> = self
            .executions
            .iter()
            .map(|e| e.execution.snapshot(include_steps))
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    /// Signal shutdown: every execution's cancellation token is a child of
    /// the shutdown token, so in-flight steps observe one unified signal.
    pub fn shutdown(&self) {
        info!("Shutdown requested, cancelling all executions");
        self.shutdown.cancel();
    }

    /// Signal shutdown and wait for every in-flight execution to settle.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let handles: Vec<_> = self
            .executions
            .iter()
            .filter_map(|e| e.run_handle.lock().take())
            .collect();
        for handle in handles {
            if let Err(error) = handle.await {
                warn!(error = %error, "Execution task failed during shutdown");
            }
        }
    }
}
