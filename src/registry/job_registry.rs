//! Job definitions known to the process, keyed by job id.

use crate::models::{ExecutionMode, Step};
use dashmap::DashMap;
use std::sync::Arc;

/// Definition of a job: its steps and how an execution of it should run.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub job_id: String,
    pub name: String,
    pub mode: ExecutionMode,
    pub max_parallel_steps: Option<usize>,
    pub stop_on_first_error: bool,
    pub steps: Vec<Arc<Step>>,
}

impl JobDefinition {
    pub fn new(job_id: impl Into<String>, name: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            job_id: job_id.into(),
            name: name.into(),
            mode,
            max_parallel_steps: None,
            stop_on_first_error: false,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn with_max_parallel_steps(mut self, bound: usize) -> Self {
        self.max_parallel_steps = Some(bound);
        self
    }

    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }
}

/// Process-local catalog of job definitions.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Arc<JobDefinition>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: JobDefinition) {
        self.jobs
            .insert(definition.job_id.clone(), Arc::new(definition));
    }

    pub fn resolve(&self, job_id: &str) -> Option<Arc<JobDefinition>> {
        self.jobs.get(job_id).map(|j| j.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
