//! # State Machine
//!
//! Status definitions for steps and executions, and the worst-case roll-up
//! that derives an execution's final status from its steps.

pub mod states;

pub use states::{ExecutionStatus, StepStatus};
