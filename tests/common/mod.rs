//! Shared test fixtures: a scriptable step executor, a recording notifier,
//! and wiring helpers for coordinator- and manager-level tests.

use async_trait::async_trait;
use dashmap::DashMap;
use jobflow_core::config::JobflowConfig;
use jobflow_core::events::{EventPublisher, ExecutionNotifier, ExecutionSummary};
use jobflow_core::executor::{ExecutorError, StepExecutor, StepOutcome};
use jobflow_core::models::{Execution, ExecutionMode, Step, StepType};
use jobflow_core::orchestration::{CancellationContext, ExecutionCoordinator, StepWorkerContext};
use jobflow_core::registry::ExecutorRegistry;
use jobflow_core::store::InMemoryAttemptStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scripted behavior of one step under the test executor.
#[derive(Debug, Clone)]
pub enum StepPlan {
    Succeed,
    SucceedAfter(Duration),
    Warn(&'static str),
    Fail(&'static str),
    /// Fail the first `failures` invocations, then succeed.
    FailTimes {
        failures: u32,
        message: &'static str,
    },
    /// Return an executor-level error (infrastructure failure).
    Error(&'static str),
    /// Never finish; resolves only through cancellation.
    Hang,
}

struct ConcurrencyGuard<'a>(&'a AtomicUsize);

impl Drop for ConcurrencyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Step executor driven by per-step plans, recording invocation counts,
/// start/finish instants, and peak concurrency.
#[derive(Default)]
pub struct ScriptedExecutor {
    plans: DashMap<String, StepPlan>,
    calls: DashMap<String, u32>,
    current: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
    pub started_at: DashMap<String, Instant>,
    pub finished_at: DashMap<String, Instant>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn plan(&self, step_id: &str, plan: StepPlan) {
        self.plans.insert(step_id.to_string(), plan);
    }

    pub fn call_count(&self, step_id: &str) -> u32 {
        self.calls.get(step_id).map(|c| *c.value()).unwrap_or(0)
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        step: &Step,
        token: &CancellationToken,
    ) -> Result<StepOutcome, ExecutorError> {
        let id = step.id.as_str().to_string();
        let invocation = {
            let mut count = self.calls.entry(id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.started_at.entry(id.clone()).or_insert_with(Instant::now);

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(now, Ordering::SeqCst);
        let _guard = ConcurrencyGuard(&self.current);

        let plan = self
            .plans
            .get(&id)
            .map(|p| p.value().clone())
            .unwrap_or(StepPlan::Succeed);
        let result = match plan {
            StepPlan::Succeed => Ok(StepOutcome::Succeeded),
            StepPlan::SucceedAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(StepOutcome::Succeeded)
            }
            StepPlan::Warn(message) => Ok(StepOutcome::Warning(message.to_string())),
            StepPlan::Fail(message) => Ok(StepOutcome::Failed(message.to_string())),
            StepPlan::FailTimes { failures, message } => {
                if invocation <= failures {
                    Ok(StepOutcome::Failed(message.to_string()))
                } else {
                    Ok(StepOutcome::Succeeded)
                }
            }
            StepPlan::Error(message) => Err(ExecutorError::new(message)),
            StepPlan::Hang => {
                token.cancelled().await;
                Ok(StepOutcome::Failed("interrupted".to_string()))
            }
        };

        self.finished_at.insert(id, Instant::now());
        result
    }
}

/// Notifier that records every summary it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub summaries: parking_lot::Mutex<Vec<ExecutionSummary>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn summaries(&self) -> Vec<ExecutionSummary> {
        self.summaries.lock().clone()
    }
}

#[async_trait]
impl ExecutionNotifier for RecordingNotifier {
    async fn execution_finished(&self, summary: &ExecutionSummary) {
        self.summaries.lock().push(summary.clone());
    }
}

/// Wiring for tests that drive coordinators or workers directly.
pub struct TestHarness {
    pub store: Arc<InMemoryAttemptStore>,
    pub executor: Arc<ScriptedExecutor>,
    pub executors: Arc<ExecutorRegistry>,
    pub events: EventPublisher,
    pub notifier: Arc<RecordingNotifier>,
    pub shutdown: CancellationToken,
    pub config: JobflowConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let executor = ScriptedExecutor::new();
        let mut registry = ExecutorRegistry::new();
        for step_type in [
            StepType::Sql,
            StepType::Pipeline,
            StepType::Package,
            StepType::Api,
            StepType::SubJob,
        ] {
            registry.register(step_type, executor.clone());
        }
        Self {
            store: Arc::new(InMemoryAttemptStore::new()),
            executor,
            executors: Arc::new(registry),
            events: EventPublisher::default(),
            notifier: RecordingNotifier::new(),
            shutdown: CancellationToken::new(),
            config: JobflowConfig::for_testing(),
        }
    }

    /// Build an execution and its cancellation scope from bare steps.
    pub fn execution(
        &self,
        mode: ExecutionMode,
        steps: Vec<Step>,
        max_parallel_steps: Option<usize>,
        stop_on_first_error: bool,
    ) -> (Arc<Execution>, Arc<CancellationContext>) {
        let steps: Vec<Arc<Step>> = steps.into_iter().map(Arc::new).collect();
        let execution = Arc::new(Execution::new(
            "test-job",
            mode,
            steps,
            max_parallel_steps,
            stop_on_first_error,
        ));
        let cancellation = Arc::new(CancellationContext::new(
            &self.shutdown,
            execution.steps().iter().map(|s| s.id.clone()),
        ));
        (execution, cancellation)
    }

    pub fn coordinator(
        &self,
        execution: &Arc<Execution>,
        cancellation: &Arc<CancellationContext>,
    ) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            execution.clone(),
            cancellation.clone(),
            self.store.clone(),
            self.executors.clone(),
            self.events.clone(),
            self.notifier.clone(),
            &self.config,
        )
    }

    pub fn worker_context(
        &self,
        execution: &Arc<Execution>,
        cancellation: &Arc<CancellationContext>,
    ) -> StepWorkerContext {
        StepWorkerContext {
            execution: execution.clone(),
            store: self.store.clone(),
            executors: self.executors.clone(),
            events: self.events.clone(),
            cancellation: cancellation.clone(),
            duplicate_lookback: self.config.duplicate_lookback(),
        }
    }
}
