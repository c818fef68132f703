//! # System Constants
//!
//! Operational defaults and boundaries of the jobflow orchestration engine.
//! Values here are fallbacks; most can be overridden through [`crate::config`].

use std::time::Duration;

/// Default bound on steps running concurrently within one execution, used
/// when a job does not configure its own limit.
pub const DEFAULT_MAX_PARALLEL_STEPS: usize = 4;

/// Default bound on executions running concurrently across the whole process.
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 8;

/// How far back the duplicate-detection probe looks for a still-running
/// attempt of the same step.
pub const DEFAULT_DUPLICATE_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Absolute expiry applied to lookup-cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Capacity of the broadcast channel carrying lifecycle events.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Principal recorded on attempts stopped by process shutdown rather than
/// by a user.
pub const SHUTDOWN_PRINCIPAL: &str = "system:shutdown";

/// Core lifecycle event names published on the event channel
pub mod events {
    pub const EXECUTION_STARTED: &str = "execution.started";
    pub const EXECUTION_FINISHED: &str = "execution.finished";
    pub const EXECUTION_CANCELLED: &str = "execution.cancelled";

    pub const STEP_STARTED: &str = "step.started";
    pub const STEP_SUCCEEDED: &str = "step.succeeded";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_RETRY_SCHEDULED: &str = "step.retry_scheduled";
    pub const STEP_SKIPPED: &str = "step.skipped";
    pub const STEP_STOPPED: &str = "step.stopped";
    pub const STEP_DUPLICATE: &str = "step.duplicate";
}
