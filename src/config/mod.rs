//! # Configuration Management
//!
//! Typed configuration with layered sources: compiled defaults, an optional
//! `config/jobflow.toml` file, and `JOBFLOW_`-prefixed environment
//! overrides (`JOBFLOW_EXECUTION__MAX_CONCURRENT_EXECUTIONS=16`).

use crate::constants;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the orchestration engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobflowConfig {
    pub execution: ExecutionConfig,
    pub cache: CacheConfig,
    pub events: EventConfig,
}

/// Execution and admission-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Process-wide bound on concurrently running executions, independent
    /// of per-job step parallelism.
    pub max_concurrent_executions: usize,
    /// Fallback bound on concurrently running steps for jobs that do not
    /// configure their own.
    pub default_max_parallel_steps: usize,
    /// Duplicate-detection lookback window, in seconds.
    pub duplicate_lookback_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: constants::DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            default_max_parallel_steps: constants::DEFAULT_MAX_PARALLEL_STEPS,
            duplicate_lookback_secs: constants::DEFAULT_DUPLICATE_LOOKBACK.as_secs(),
        }
    }
}

/// Lookup-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Absolute entry expiry, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

/// Event channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: constants::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl JobflowConfig {
    /// Load configuration from defaults, the optional config file, and
    /// environment overrides, in that precedence order.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&JobflowConfig::default())?;
        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/jobflow").required(false))
            .add_source(Environment::with_prefix("JOBFLOW").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Configuration sized for fast tests.
    pub fn for_testing() -> Self {
        Self {
            execution: ExecutionConfig {
                max_concurrent_executions: 4,
                default_max_parallel_steps: 2,
                duplicate_lookback_secs: 60 * 60,
            },
            cache: CacheConfig { ttl_secs: 60 },
            events: EventConfig {
                channel_capacity: 64,
            },
        }
    }

    pub fn duplicate_lookback(&self) -> Duration {
        Duration::from_secs(self.execution.duplicate_lookback_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = JobflowConfig::default();
        assert_eq!(
            config.execution.max_concurrent_executions,
            constants::DEFAULT_MAX_CONCURRENT_EXECUTIONS
        );
        assert_eq!(config.duplicate_lookback(), constants::DEFAULT_DUPLICATE_LOOKBACK);
        assert_eq!(config.cache_ttl(), constants::DEFAULT_CACHE_TTL);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let loaded = JobflowConfig::load().expect("defaults should deserialize");
        assert_eq!(
            loaded.execution.default_max_parallel_steps,
            JobflowConfig::default().execution.default_max_parallel_steps
        );
    }
}
