//! # jobflow-core
//!
//! Orchestration core for multi-step data/ETL jobs. The engine takes a set
//! of steps with declared dependencies, decides a legal execution order,
//! runs steps with bounded parallelism, retries failures with backoff,
//! refuses duplicate concurrent runs of the same step, and propagates
//! layered cancellation (per step, per execution, process shutdown) —
//! while remote step execution may fail, hang, or require expensive
//! lookups that must not be repeated needlessly.
//!
//! ## Architecture
//!
//! - [`graph`]: dependency graph and cycle detector (pure, no I/O)
//! - [`sync`]: keyed async lock and single-flight lookup cache, shared by
//!   all executions in the process
//! - [`models`] / [`state_machine`]: steps, executions, attempts, statuses
//! - [`executor`] / [`registry`] / [`store`] / [`events`]: the seams to
//!   external collaborators — step executors, persistence, notification
//! - [`orchestration`]: step workers, the two ordering strategies, and the
//!   process-wide execution manager
//!
//! The crate is a pure in-memory state-machine engine: no wire format of
//! its own, invoked through [`orchestration::ExecutionManager`].

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod store;
pub mod sync;

pub use config::JobflowConfig;
pub use error::{JobflowError, Result};
pub use events::{EventPublisher, ExecutionNotifier, ExecutionSummary, JobflowEvent};
pub use executor::{ExecutorError, StepExecutor, StepOutcome};
pub use models::{
    DependencyEdge, Execution, ExecutionId, ExecutionMode, ExecutionSnapshot, RetryPolicy, Step,
    StepAttempt, StepFilter, StepId, StepType,
};
pub use orchestration::{ExecutionCoordinator, ExecutionManager, OrchestrationError};
pub use registry::{ExecutorRegistry, JobDefinition, JobRegistry};
pub use state_machine::{ExecutionStatus, StepStatus};
pub use store::{AttemptStore, InMemoryAttemptStore, StoreError};
pub use sync::{KeyedLock, LookupCache};
