//! # Dependency-Based Orchestration
//!
//! Steps run as soon as their dependencies resolve. The orchestrator loops
//! in rounds: every still-unstarted step is assigned an action — execute,
//! skip, or wait — then, if anything is still waiting, the loop blocks on
//! *one* in-flight worker finishing before recomputing. Waiting on any one
//! worker keeps rounds responsive without a poll interval; waiting on all
//! of them would stall the round on the slowest step.
//!
//! Pre-condition: the execution's dependency graph is acyclic. The
//! coordinator refuses cyclic executions before this strategy ever runs.

use crate::models::{Step, StepId};
use crate::orchestration::step_worker::{acquire_slot, spawn_worker, StepWorkerContext};
use crate::state_machine::{ExecutionStatus, StepStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Scheduling decision for one unstarted step in one round.
enum StepAction {
    Execute,
    Skip(String),
    Wait,
}

/// Runs one execution in dependency order with skip cascades.
pub struct DependencyOrchestrator {
    ctx: StepWorkerContext,
    semaphore: Arc<Semaphore>,
}

impl DependencyOrchestrator {
    pub fn new(ctx: StepWorkerContext, semaphore: Arc<Semaphore>) -> Self {
        Self { ctx, semaphore }
    }

    pub async fn run(&self) -> ExecutionStatus {
        let execution = self.ctx.execution.clone();
        let token = self.ctx.cancellation.execution_token().clone();
        let mut join_set: JoinSet<(StepId, StepStatus)> = JoinSet::new();
        // Steps handed to a worker. The status map lags behind a spawn
        // until the worker task first runs, so rounds must not re-dispatch
        // based on the map alone.
        let mut dispatched: HashSet<StepId> = HashSet::new();

        loop {
            if token.is_cancelled() {
                self.mark_remaining_stopped(&dispatched).await;
                break;
            }

            let pending = self.undispatched(&dispatched);
            if pending.is_empty() {
                break;
            }

            let mut progressed = false;
            let mut cancelled_while_admitting = false;
            for step in pending {
                match self.compute_action(&step) {
                    StepAction::Skip(reason) => {
                        debug!(step_id = %step.id, reason = %reason, "Skipping step");
                        self.ctx
                            .record_unstarted(&step.id, StepStatus::Skipped, Some(reason), None)
                            .await;
                        progressed = true;
                    }
                    StepAction::Execute => {
                        let Some(permit) = acquire_slot(&self.semaphore, &token).await else {
                            cancelled_while_admitting = true;
                            break;
                        };
                        debug!(step_id = %step.id, "Starting step worker");
                        dispatched.insert(step.id.clone());
                        spawn_worker(&mut join_set, self.ctx.clone(), step.clone(), permit);
                        progressed = true;
                    }
                    StepAction::Wait => {}
                }
            }
            if cancelled_while_admitting {
                continue; // the cancellation check at the top settles the rest
            }

            if self.undispatched(&dispatched).is_empty() {
                break;
            }
            if progressed {
                // A skip may have unblocked further skips; recompute before
                // blocking so cascades settle without waiting on a worker.
                continue;
            }

            match join_set.join_next().await {
                Some(Ok((step_id, status))) => {
                    debug!(%step_id, %status, "Step reached terminal status");
                }
                Some(Err(error)) => warn!(error = %error, "Step worker task failed"),
                None => {
                    // Nothing running and nothing actionable. The cycle
                    // pre-check makes this unreachable; settle defensively
                    // rather than spin.
                    warn!("No runnable steps and no workers in flight, skipping remainder");
                    for step in self.undispatched(&dispatched) {
                        self.ctx
                            .record_unstarted(
                                &step.id,
                                StepStatus::Skipped,
                                Some("dependencies can never be satisfied".to_string()),
                                None,
                            )
                            .await;
                    }
                    break;
                }
            }
        }

        // Final join: drain every in-flight worker before rolling up.
        while let Some(joined) = join_set.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "Step worker task failed");
            }
        }

        execution.roll_up()
    }

    /// Decide what to do with one unstarted step this round.
    ///
    /// Dependencies on steps outside the execution snapshot (filtered out
    /// at creation) are treated as satisfied.
    fn compute_action(&self, step: &Step) -> StepAction {
        let execution = &self.ctx.execution;
        let mut all_terminal = true;
        for edge in &step.depends_on {
            if !execution.contains(&edge.step_id) {
                continue;
            }
            let status = execution.status_of(&edge.step_id);
            if edge.strict && status.is_terminal() && status.is_failure_like() {
                return StepAction::Skip(format!(
                    "strict dependency '{}' ended in status '{}'",
                    edge.step_id, status
                ));
            }
            if !status.is_terminal() {
                all_terminal = false;
            }
        }
        if all_terminal {
            StepAction::Execute
        } else {
            StepAction::Wait
        }
    }

    /// Unstarted steps that have not been handed to a worker yet.
    fn undispatched(&self, dispatched: &HashSet<StepId>) -> Vec<Arc<Step>> {
        self.ctx
            .execution
            .not_started_steps()
            .into_iter()
            .filter(|s| !dispatched.contains(&s.id))
            .collect()
    }

    /// Dispatched-but-unsettled steps are left to their own workers, which
    /// observe the same cancellation and record their own stop.
    async fn mark_remaining_stopped(&self, dispatched: &HashSet<StepId>) {
        for step in self.undispatched(dispatched) {
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
