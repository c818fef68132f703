//! # Orchestration Engine
//!
//! The concurrency core of the crate: per-step retry workers, the two
//! interchangeable ordering strategies, the per-execution coordinator, and
//! the process-wide execution manager.
//!
//! ## Core Components
//!
//! - **ExecutionManager**: registry of active executions, admission
//!   control across jobs, and the create/start/cancel/query entry points
//! - **ExecutionCoordinator**: conducts one execution — cycle refusal,
//!   strategy selection, final status settlement
//! - **PhaseOrchestrator** / **DependencyOrchestrator**: the two ordering
//!   strategies over a shared worker pool
//! - **StepWorker**: one step's lifecycle — duplicate probe, executor
//!   call, retry loop, cancellable backoff
//! - **CancellationContext**: the shutdown ⊃ execution ⊃ step token tree
//!
//! Control flows top-down (manager → coordinator → strategy → worker →
//! executor) and status flows bottom-up: each worker records its terminal
//! state, the strategy uses those to decide the next round, and the
//! manager aggregates per-execution status for callers.

pub mod cancellation;
pub mod coordinator;
pub mod dependency_orchestrator;
pub mod errors;
pub mod execution_manager;
pub mod phase_orchestrator;
pub mod step_worker;

pub use cancellation::CancellationContext;
pub use coordinator::ExecutionCoordinator;
pub use dependency_orchestrator::DependencyOrchestrator;
pub use errors::{OrchestrationError, OrchestrationResult};
pub use execution_manager::ExecutionManager;
pub use phase_orchestrator::PhaseOrchestrator;
pub use step_worker::{StepWorker, StepWorkerContext};
