use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one step within one execution, derived from its most recent
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Initial state before any attempt exists
    NotStarted,
    /// An attempt is currently executing
    Running,
    /// The last attempt failed and a retry is pending
    AwaitingRetry,
    /// Step completed successfully
    Succeeded,
    /// Step completed with a warning message
    Warning,
    /// Step failed after exhausting its retry budget
    Failed,
    /// Step was cancelled by a user or by process shutdown
    Stopped,
    /// Step was never started because a strict dependency failed
    Skipped,
    /// Another attempt of the same step was already running
    Duplicate,
}

impl StepStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded
                | Self::Warning
                | Self::Failed
                | Self::Stopped
                | Self::Skipped
                | Self::Duplicate
        )
    }

    /// Check if an attempt of the step is currently in flight or pending
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::AwaitingRetry)
    }

    /// Check if this terminal state blocks strict dependents.
    ///
    /// `Skipped` must count here or skip cascades would stall after one
    /// hop; `Stopped` and `Duplicate` count because the dependent's
    /// precondition (a side effect that actually happened) was not met.
    pub fn is_failure_like(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Stopped | Self::Skipped | Self::Duplicate
        )
    }

    /// Check if the step produced its intended side effect
    pub fn is_success_like(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Warning)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::AwaitingRetry => write!(f, "awaiting_retry"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Warning => write!(f, "warning"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Skipped => write!(f, "skipped"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "running" => Ok(Self::Running),
            "awaiting_retry" => Ok(Self::AwaitingRetry),
            "succeeded" => Ok(Self::Succeeded),
            "warning" => Ok(Self::Warning),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            "skipped" => Ok(Self::Skipped),
            "duplicate" => Ok(Self::Duplicate),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Aggregate status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Succeeded,
    Warning,
    Failed,
    Stopped,
}

impl ExecutionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Warning | Self::Failed | Self::Stopped
        )
    }

    /// Derive the execution status from its step statuses, worst case first:
    /// any `Failed` wins, then `Stopped`, then `Warning`/`Duplicate`, else
    /// `Succeeded`. `Skipped` carries no severity of its own; the failure
    /// that caused the skip already counts. Any non-terminal step means the
    /// execution is still `Running`.
    pub fn roll_up<I>(step_statuses: I) -> Self
    where
        I: IntoIterator<Item = StepStatus>,
    {
        let mut worst = Self::Succeeded;
        for status in step_statuses {
            if !status.is_terminal() {
                return Self::Running;
            }
            let severity = match status {
                StepStatus::Failed => Self::Failed,
                StepStatus::Stopped => Self::Stopped,
                StepStatus::Warning | StepStatus::Duplicate => Self::Warning,
                _ => Self::Succeeded,
            };
            if rank(severity) > rank(worst) {
                worst = severity;
            }
        }
        worst
    }
}

fn rank(status: ExecutionStatus) -> u8 {
    match status {
        ExecutionStatus::Failed => 3,
        ExecutionStatus::Stopped => 2,
        ExecutionStatus::Warning => 1,
        _ => 0,
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Warning => write!(f, "warning"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}
