//! Step definitions: identity, typing, retry policy, and declared
//! dependencies. Steps are defined once per job and are immutable during a
//! run; orchestrators share them behind `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Stable identity of a step within a job.
///
/// Scheduling state is keyed by this id rather than by object identity, so
/// the same step definition can be referenced across executions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Closed set of step kinds the engine can dispatch.
///
/// Each kind maps to one executor implementation registered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Sql,
    Pipeline,
    Package,
    Api,
    SubJob,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql => write!(f, "sql"),
            Self::Pipeline => write!(f, "pipeline"),
            Self::Package => write!(f, "package"),
            Self::Api => write!(f, "api"),
            Self::SubJob => write!(f, "sub_job"),
        }
    }
}

/// Directed dependency edge from a step to one of its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub step_id: StepId,
    /// Strict: a failure-like terminal state of the prerequisite forces the
    /// dependent to be skipped. Non-strict: any terminal state unblocks it.
    pub strict: bool,
}

/// Retry policy for whole-step failures.
///
/// Transient remote hiccups are expected to be absorbed inside the
/// executors; this budget is spent only on attempts the executor reported
/// as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt; a step makes at most
    /// `max_retries + 1` attempts.
    pub max_retries: u32,
    /// Fixed delay between a failed attempt and the next one.
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// One unit of work in a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub step_type: StepType,
    /// Execution phase, consumed by phase-based orchestration only.
    pub phase: i32,
    pub retry: RetryPolicy,
    pub depends_on: Vec<DependencyEdge>,
    /// Optional per-attempt deadline; elapsing counts as a retryable
    /// failure, not a stop.
    pub timeout: Option<Duration>,
    /// Opaque executor input (connection names, item identifiers, ...).
    pub payload: serde_json::Value,
}

impl Step {
    pub fn new(id: impl Into<StepId>, name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type,
            phase: 0,
            retry: RetryPolicy::default(),
            depends_on: Vec::new(),
            timeout: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_phase(mut self, phase: i32) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, retry_interval: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            retry_interval,
        };
        self
    }

    pub fn with_dependency(mut self, step_id: impl Into<StepId>, strict: bool) -> Self {
        self.depends_on.push(DependencyEdge {
            step_id: step_id.into(),
            strict,
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Selection of steps to include when creating an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFilter {
    /// Run every step of the job.
    All,
    /// Run only the named steps.
    Only(HashSet<StepId>),
}

impl StepFilter {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, id: &StepId) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

impl Default for StepFilter {
    fn default() -> Self {
        Self::All
    }
}
