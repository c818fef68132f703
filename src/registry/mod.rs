//! # Registries
//!
//! Startup-time wiring: step-type tags to executor implementations, and
//! job ids to job definitions. Both are resolved once when the service is
//! assembled and shared behind `Arc` afterwards.

pub mod executor_registry;
pub mod job_registry;

pub use executor_registry::ExecutorRegistry;
pub use job_registry::{JobDefinition, JobRegistry};

use crate::models::StepType;
use thiserror::Error;

/// Errors raised while resolving registry entries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No executor registered for step type '{step_type}'")]
    UnknownStepType { step_type: StepType },

    #[error("Job '{job_id}' not found")]
    UnknownJob { job_id: String },
}
