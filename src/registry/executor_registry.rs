//! Step-type tag to executor mapping, built once at startup.

use crate::executor::StepExecutor;
use crate::models::StepType;
use crate::registry::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Immutable dispatch table from step type to executor implementation.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<StepType, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executor for a step type, replacing any previous one.
    pub fn register(&mut self, step_type: StepType, executor: Arc<dyn StepExecutor>) -> &mut Self {
        info!(step_type = %step_type, "Registering step executor");
        self.executors.insert(step_type, executor);
        self
    }

    pub fn resolve(&self, step_type: StepType) -> Result<Arc<dyn StepExecutor>, RegistryError> {
        self.executors
            .get(&step_type)
            .cloned()
            .ok_or(RegistryError::UnknownStepType { step_type })
    }

    pub fn supports(&self, step_type: StepType) -> bool {
        self.executors.contains_key(&step_type)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("step_types", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}
