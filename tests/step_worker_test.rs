//! Step worker behavior: retry policy, duplicate detection, cancellation
//! precedence, and timeout handling.

mod common;

use common::{StepPlan, TestHarness};
use jobflow_core::models::{ExecutionMode, Step, StepAttempt, StepId, StepType};
use jobflow_core::orchestration::StepWorker;
use jobflow_core::state_machine::StepStatus;
use jobflow_core::store::AttemptStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_produces_exactly_max_plus_one_attempts() {
    let harness = TestHarness::new();
    harness.executor.plan("load", StepPlan::Fail("connection reset"));

    let step = Step::new("load", "Load", StepType::Sql).with_retry(2, minutes(5));
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step.clone()], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Failed);
    assert_eq!(harness.executor.call_count("load"), 3);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("load"))
        .await
        .unwrap();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].attempt, 0);
    assert_eq!(attempts[0].status, StepStatus::AwaitingRetry);
    assert_eq!(attempts[1].status, StepStatus::AwaitingRetry);
    assert_eq!(attempts[2].status, StepStatus::Failed);
    assert_eq!(attempts[2].message.as_deref(), Some("connection reset"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failures() {
    let harness = TestHarness::new();
    harness.executor.plan(
        "load",
        StepPlan::FailTimes {
            failures: 1,
            message: "deadlock victim",
        },
    );

    let step = Step::new("load", "Load", StepType::Sql).with_retry(3, minutes(1));
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Succeeded);
    assert_eq!(harness.executor.call_count("load"), 2);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("load"))
        .await
        .unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].status, StepStatus::AwaitingRetry);
    assert_eq!(attempts[1].status, StepStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_detection_refuses_concurrent_run() {
    let harness = TestHarness::new();

    // Another execution, elsewhere in the process, is mid-run on the same
    // step id.
    let other_execution = Uuid::new_v4();
    let running = StepAttempt::begin(other_execution, StepId::from("nightly-load"), 0);
    harness.store.record(&running).await.unwrap();

    let step = Step::new("nightly-load", "Nightly load", StepType::Pipeline);
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Duplicate);
    // The executor must never run for a duplicate.
    assert_eq!(harness.executor.call_count("nightly-load"), 0);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("nightly-load"))
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, StepStatus::Duplicate);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_step_never_reaches_executor() {
    let harness = TestHarness::new();
    let step = Step::new("load", "Load", StepType::Sql);
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    cancellation.cancel_execution("alice");

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Stopped);
    assert_eq!(harness.executor.call_count("load"), 0);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("load"))
        .await
        .unwrap();
    assert_eq!(attempts[0].status, StepStatus::Stopped);
    assert_eq!(attempts[0].stopped_by.as_deref(), Some("alice"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_stops_instead_of_retrying() {
    let harness = TestHarness::new();
    harness.executor.plan("load", StepPlan::Fail("boom"));

    let step = Step::new("load", "Load", StepType::Sql).with_retry(3, minutes(10));
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let handle = tokio::spawn(worker.run());

    // Let the first attempt fail and the backoff begin, then cancel well
    // before the 10 minute interval elapses.
    tokio::time::sleep(Duration::from_secs(5)).await;
    cancellation.cancel_execution("bob");

    let status = handle.await.unwrap();
    assert_eq!(status, StepStatus::Stopped);
    // No second executor invocation: cancellation beat the retry.
    assert_eq!(harness.executor.call_count("load"), 1);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("load"))
        .await
        .unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].status, StepStatus::AwaitingRetry);
    assert_eq!(attempts[1].status, StepStatus::Stopped);
    assert_eq!(attempts[1].stopped_by.as_deref(), Some("bob"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_retryable_failure() {
    let harness = TestHarness::new();
    harness
        .executor
        .plan("slow", StepPlan::SucceedAfter(minutes(30)));

    let step = Step::new("slow", "Slow", StepType::Api)
        .with_timeout(minutes(1))
        .with_retry(1, minutes(2));
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    // Both attempts time out; the timeout consumed the retry budget the
    // same way a business failure would.
    assert_eq!(status, StepStatus::Failed);
    assert_eq!(harness.executor.call_count("slow"), 2);

    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("slow"))
        .await
        .unwrap();
    assert_eq!(attempts[0].status, StepStatus::AwaitingRetry);
    assert_eq!(attempts[1].status, StepStatus::Failed);
    assert!(attempts[1]
        .message
        .as_deref()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_executor_error_is_captured_as_business_failure() {
    let harness = TestHarness::new();
    harness
        .executor
        .plan("flaky", StepPlan::Error("socket closed unexpectedly"));

    let step = Step::new("flaky", "Flaky", StepType::Api);
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Failed);
    let attempts = harness
        .store
        .attempts(execution.id, &StepId::from("flaky"))
        .await
        .unwrap();
    assert_eq!(
        attempts[0].message.as_deref(),
        Some("socket closed unexpectedly")
    );
}

#[tokio::test(start_paused = true)]
async fn test_warning_outcome_is_terminal_success() {
    let harness = TestHarness::new();
    harness
        .executor
        .plan("load", StepPlan::Warn("3 rows rejected"));

    let step = Step::new("load", "Load", StepType::Sql).with_retry(2, minutes(1));
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let status = worker.run().await;

    assert_eq!(status, StepStatus::Warning);
    assert_eq!(harness.executor.call_count("load"), 1);
    assert_eq!(
        execution.status_of(&StepId::from("load")),
        StepStatus::Warning
    );
}

#[tokio::test(start_paused = true)]
async fn test_running_status_is_observable_mid_attempt() {
    let harness = TestHarness::new();
    harness.executor.plan("slow", StepPlan::SucceedAfter(minutes(5)));

    let step = Step::new("slow", "Slow", StepType::Pipeline);
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let worker = StepWorker::new(
        harness.worker_context(&execution, &cancellation),
        execution.steps()[0].clone(),
    );
    let handle = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_secs(10)).await;

    // Mid-attempt the status map and the store both show Running.
    assert_eq!(
        execution.status_of(&StepId::from("slow")),
        StepStatus::Running
    );
    assert!(harness
        .store
        .is_step_running(&StepId::from("slow"), Duration::from_secs(3600))
        .await
        .unwrap());

    let status = handle.await.unwrap();
    assert_eq!(status, StepStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_steps_arc_shared_with_worker() {
    // Regression guard: the worker holds a reference to the execution's
    // step snapshot, so status updates land in the same map the
    // orchestrator reads.
    let harness = TestHarness::new();
    let step = Step::new("load", "Load", StepType::Sql);
    let (execution, cancellation) =
        harness.execution(ExecutionMode::DependencyBased, vec![step], None, false);

    let step_arc: Arc<Step> = execution.steps()[0].clone();
    let worker = StepWorker::new(harness.worker_context(&execution, &cancellation), step_arc);
    worker.run().await;

    assert_eq!(
        execution.status_of(&StepId::from("load")),
        StepStatus::Succeeded
    );
}
