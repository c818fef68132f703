//! Layered cancellation for one execution.
//!
//! Tokens form a tree: process shutdown at the root, the execution's token
//! as its child, and one child per step below that. A step therefore
//! observes a single unified signal — the logical OR of per-step cancel,
//! whole-execution cancel, and shutdown — while the recorded principal
//! still tells audit who or what cancelled.

use crate::constants::SHUTDOWN_PRINCIPAL;
use crate::models::StepId;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Cancellation scope of one execution.
#[derive(Debug)]
pub struct CancellationContext {
    execution_token: CancellationToken,
    step_tokens: DashMap<StepId, CancellationToken>,
    /// Principal that cancelled the whole execution, when it was.
    cancelled_by: parking_lot::RwLock<Option<String>>,
    /// Principals that cancelled individual steps.
    step_cancelled_by: DashMap<StepId, String>,
}

impl CancellationContext {
    /// Build the token tree for an execution under the process shutdown
    /// token.
    pub fn new<I>(shutdown: &CancellationToken, step_ids: I) -> Self
    where
        I: IntoIterator<Item = StepId>,
    {
        let execution_token = shutdown.child_token();
        let step_tokens = step_ids
            .into_iter()
            .map(|id| (id, execution_token.child_token()))
            .collect();
        Self {
            execution_token,
            step_tokens,
            cancelled_by: parking_lot::RwLock::new(None),
            step_cancelled_by: DashMap::new(),
        }
    }

    pub fn execution_token(&self) -> &CancellationToken {
        &self.execution_token
    }

    /// Token a step worker should observe; fires on step, execution, or
    /// shutdown cancellation.
    pub fn step_token(&self, step_id: &StepId) -> CancellationToken {
        self.step_tokens
            .get(step_id)
            .map(|t| t.value().clone())
            .unwrap_or_else(|| self.execution_token.child_token())
    }

    /// Cancel the whole execution on behalf of `principal`.
    pub fn cancel_execution(&self, principal: impl Into<String>) {
        {
            let mut cancelled_by = self.cancelled_by.write();
            if cancelled_by.is_none() {
                *cancelled_by = Some(principal.into());
            }
        }
        self.execution_token.cancel();
    }

    /// Cancel one step on behalf of `principal`. Returns false when the
    /// step is not part of this execution.
    pub fn cancel_step(&self, step_id: &StepId, principal: impl Into<String>) -> bool {
        let Some(token) = self.step_tokens.get(step_id) else {
            return false;
        };
        self.step_cancelled_by
            .entry(step_id.clone())
            .or_insert_with(|| principal.into());
        token.cancel();
        true
    }

    /// Who cancelled this step, for attempt records: the step's own
    /// canceller, else the execution's, else process shutdown.
    pub fn stopping_principal(&self, step_id: &StepId) -> String {
        if let Some(principal) = self.step_cancelled_by.get(step_id) {
            return principal.value().clone();
        }
        if let Some(principal) = self.cancelled_by.read().clone() {
            return principal;
        }
        SHUTDOWN_PRINCIPAL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(steps: &[&str]) -> (CancellationToken, CancellationContext) {
        let shutdown = CancellationToken::new();
        let context =
            CancellationContext::new(&shutdown, steps.iter().map(|s| StepId::from(*s)));
        (shutdown, context)
    }

    #[test]
    fn test_shutdown_reaches_every_step() {
        let (shutdown, context) = context_with(&["a", "b"]);
        shutdown.cancel();
        assert!(context.execution_token().is_cancelled());
        assert!(context.step_token(&StepId::from("a")).is_cancelled());
        assert!(context.step_token(&StepId::from("b")).is_cancelled());
        assert_eq!(
            context.stopping_principal(&StepId::from("a")),
            SHUTDOWN_PRINCIPAL
        );
    }

    #[test]
    fn test_step_cancel_is_scoped() {
        let (_shutdown, context) = context_with(&["a", "b"]);
        assert!(context.cancel_step(&StepId::from("a"), "carol"));
        assert!(context.step_token(&StepId::from("a")).is_cancelled());
        assert!(!context.step_token(&StepId::from("b")).is_cancelled());
        assert!(!context.execution_token().is_cancelled());
        assert_eq!(context.stopping_principal(&StepId::from("a")), "carol");
    }

    #[test]
    fn test_execution_cancel_records_first_principal() {
        let (_shutdown, context) = context_with(&["a"]);
        context.cancel_execution("dave");
        context.cancel_execution("erin");
        assert_eq!(context.stopping_principal(&StepId::from("a")), "dave");
        assert!(context.step_token(&StepId::from("a")).is_cancelled());
    }

    #[test]
    fn test_unknown_step_cancel_is_rejected() {
        let (_shutdown, context) = context_with(&["a"]);
        assert!(!context.cancel_step(&StepId::from("zz"), "carol"));
    }
}
