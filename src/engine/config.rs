//! `EngineConfig` (spec.md §6): every enumerated configuration item, wired
//! down to the sub-component configs it is composed from.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conflict_resolver::ConflictResolverConfig;
use crate::coordinator::{CoordinatorConfig, ExecutionMode};
use crate::worker_pool::{AgentPoolStrategy, LoadBalancingAlgorithm, TypeBounds, WorkerPoolConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub coordinator: CoordinatorConfig,
    pub worker_pool: WorkerPoolConfig,
    pub conflict_resolver: ConflictResolverConfig,
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,
    pub enable_context_isolation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            conflict_resolver: ConflictResolverConfig::default(),
            health_check_interval: Duration::from_secs(30),
            enable_context_isolation: true,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document into an `EngineConfig`, falling back to
    /// `Default` for any key the document omits (spec.md §4.8 — additive
    /// over programmatic construction, not a replacement for it).
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize, Default)]
        #[serde(default, deny_unknown_fields)]
        struct Partial {
            max_parallel_cycles: Option<usize>,
            execution_mode: Option<ExecutionMode>,
            agent_pool_strategy: Option<AgentPoolStrategy>,
            load_balancing: Option<LoadBalancingAlgorithm>,
            per_type: Option<HashMap<String, TypeBounds>>,
            scale_up_threshold: Option<f64>,
            scale_down_threshold: Option<f64>,
            burst_threshold: Option<f64>,
            coordination_check_interval: Option<f64>,
            health_check_interval: Option<f64>,
            resource_timeout: Option<f64>,
            failure_threshold: Option<u32>,
            recovery_delay: Option<f64>,
            max_resolution_attempts: Option<u32>,
            enable_auto_scaling: Option<bool>,
            enable_health_monitoring: Option<bool>,
            enable_predictive_scheduling: Option<bool>,
            enable_conflict_prevention: Option<bool>,
            enable_auto_resolution: Option<bool>,
            enable_semantic_analysis: Option<bool>,
            enable_resource_locking: Option<bool>,
            enable_coordination_events: Option<bool>,
            enable_context_isolation: Option<bool>,
        }

        let partial: Partial = toml::from_str(s)?;
        let mut config = EngineConfig::default();

        if let Some(v) = partial.max_parallel_cycles {
            config.coordinator.max_parallel_cycles = v;
        }
        if let Some(v) = partial.execution_mode {
            config.coordinator.execution_mode = v;
        }
        if let Some(v) = partial.agent_pool_strategy {
            config.worker_pool.strategy = v;
        }
        if let Some(v) = partial.load_balancing {
            config.worker_pool.load_balancing = v;
        }
        if let Some(v) = partial.per_type {
            config.worker_pool.per_type = v;
        }
        if let Some(v) = partial.scale_up_threshold {
            config.worker_pool.scale_up_threshold = v;
        }
        if let Some(v) = partial.scale_down_threshold {
            config.worker_pool.scale_down_threshold = v;
        }
        if let Some(v) = partial.burst_threshold {
            config.worker_pool.burst_threshold = v;
        }
        if let Some(v) = partial.coordination_check_interval {
            config.coordinator.coordination_check_interval = Duration::from_secs_f64(v);
        }
        if let Some(v) = partial.health_check_interval {
            config.health_check_interval = Duration::from_secs_f64(v);
            config.worker_pool.health_check_interval = Duration::from_secs_f64(v);
        }
        if let Some(v) = partial.resource_timeout {
            config.coordinator.resource_timeout = Duration::from_secs_f64(v);
        }
        if let Some(v) = partial.failure_threshold {
            config.worker_pool.failure_threshold = v;
        }
        if let Some(v) = partial.recovery_delay {
            config.worker_pool.recovery_delay = Duration::from_secs_f64(v);
        }
        if let Some(v) = partial.max_resolution_attempts {
            config.conflict_resolver.max_resolution_attempts = v;
        }
        if let Some(v) = partial.enable_auto_scaling {
            config.worker_pool.enable_auto_scaling = v;
        }
        if let Some(v) = partial.enable_health_monitoring {
            config.worker_pool.enable_health_monitoring = v;
        }
        if let Some(v) = partial.enable_predictive_scheduling {
            config.coordinator.enable_predictive_scheduling = v;
        }
        if let Some(v) = partial.enable_conflict_prevention {
            config.coordinator.enable_conflict_prevention = v;
        }
        if let Some(v) = partial.enable_auto_resolution {
            config.conflict_resolver.enable_auto_resolution = v;
        }
        if let Some(v) = partial.enable_semantic_analysis {
            config.conflict_resolver.enable_semantic_analysis = v;
        }
        if let Some(v) = partial.enable_resource_locking {
            config.coordinator.enable_resource_locking = v;
        }
        if let Some(v) = partial.enable_coordination_events {
            config.coordinator.enable_coordination_events = v;
        }
        if let Some(v) = partial.enable_context_isolation {
            config.enable_context_isolation = v;
        }

        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&contents)?)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = EngineConfig::from_toml_str("max_parallel_cycles = 5\n").unwrap();
        assert_eq!(config.coordinator.max_parallel_cycles, 5);
        assert_eq!(config.worker_pool.scale_up_threshold, 0.8);
    }

    #[test]
    fn per_type_worker_bounds_parse() {
        let config = EngineConfig::from_toml_str(
            "[per_type.design]\nmin = 1\nmax = 4\n",
        )
        .unwrap();
        let bounds = config.worker_pool.per_type.get("design").unwrap();
        assert_eq!(bounds.min, 1);
        assert_eq!(bounds.max, 4);
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(EngineConfig::from_toml_str("not_a_real_key = 1\n").is_err());
    }

    #[test]
    fn feature_flags_parse() {
        let config = EngineConfig::from_toml_str("enable_conflict_prevention = false\n").unwrap();
        assert!(!config.coordinator.enable_conflict_prevention);
    }
}
