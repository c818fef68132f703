//! Top-level error type aggregating the subsystem errors of the crate.

use thiserror::Error;

/// Errors surfaced across module boundaries.
///
/// Subsystems define their own error enums; this type exists for callers
/// that drive the engine end to end and want a single failure channel.
#[derive(Debug, Error)]
pub enum JobflowError {
    #[error(transparent)]
    Orchestration(#[from] crate::orchestration::OrchestrationError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, JobflowError>;
