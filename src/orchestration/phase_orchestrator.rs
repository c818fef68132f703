//! # Phase-Based Orchestration
//!
//! Steps are grouped by their integer execution phase and phases run in
//! ascending order with a full barrier between them: no step of phase N+1
//! starts before every step of phase N is terminal. Dependency edges are
//! not consulted; the phase numbers are the ordering.

use crate::models::StepId;
use crate::orchestration::step_worker::{acquire_slot, spawn_worker, StepWorkerContext};
use crate::state_machine::{ExecutionStatus, StepStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs one execution phase by phase.
pub struct PhaseOrchestrator {
    ctx: StepWorkerContext,
    semaphore: Arc<Semaphore>,
}

impl PhaseOrchestrator {
    pub fn new(ctx: StepWorkerContext, semaphore: Arc<Semaphore>) -> Self {
        Self { ctx, semaphore }
    }

    pub async fn run(&self) -> ExecutionStatus {
        let execution = self.ctx.execution.clone();
        let token = self.ctx.cancellation.execution_token().clone();

        let mut phases: BTreeMap<i32, Vec<_>> = BTreeMap::new();
        for step in execution.steps() {
            phases.entry(step.phase).or_default().push(step.clone());
        }

        for (phase, steps) in &phases {
            if token.is_cancelled() {
                self.mark_remaining_stopped().await;
                break;
            }
            debug!(phase, step_count = steps.len(), "Starting phase");

            let mut join_set: JoinSet<(StepId, StepStatus)> = JoinSet::new();
            let mut cancelled_while_admitting = false;
            for step in steps {
                let Some(permit) = acquire_slot(&self.semaphore, &token).await else {
                    cancelled_while_admitting = true;
                    break;
                };
                spawn_worker(&mut join_set, self.ctx.clone(), step.clone(), permit);
            }

            // Full barrier: the phase is done only when every worker is.
            let mut phase_failed = false;
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((step_id, status)) => {
                        debug!(%step_id, %status, "Step reached terminal status");
                        if status == StepStatus::Failed {
                            phase_failed = true;
                        }
                    }
                    Err(error) => warn!(error = %error, "Step worker task failed"),
                }
            }

            if cancelled_while_admitting {
                self.mark_remaining_stopped().await;
                break;
            }
            if execution.stop_on_first_error && phase_failed {
                info!(phase, "Phase contained a failed step, skipping remaining phases");
                self.mark_remaining_skipped(*phase).await;
                break;
            }
        }

        execution.roll_up()
    }

    async fn mark_remaining_skipped(&self, failed_phase: i32) {
        for step in self.ctx.execution.not_started_steps() {
            self.ctx
                .record_unstarted(
                    &step.id,
                    StepStatus::Skipped,
                    Some(format!(
                        "skipped after a failure in phase {failed_phase} with stop-on-first-error set"
                    )),
                    None,
                )
                .await;
        }
    }

    async fn mark_remaining_stopped(&self) {
        for step in self.ctx.execution.not_started_steps() {
            let stopped_by = self.ctx.cancellation.stopping_principal(&step.id);
            self.ctx
                .record_unstarted(
                    &step.id,
                    StepStatus::Stopped,
                    Some("cancelled before start".to_string()),
                    Some(stopped_by),
                )
                .await;
        }
    }
}
