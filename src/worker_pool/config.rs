//! Worker pool configuration: strategy, load-balancing algorithm, per-type
//! bounds, scaling thresholds, and health/failure intervals (spec.md §4.2,
//! §6 configuration enumeration).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentPoolStrategy {
    Static,
    Dynamic,
    Burst,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancingAlgorithm {
    RoundRobin,
    LeastLoaded,
    CapabilityBased,
    PriorityWeighted,
}

/// Per-component `min`/`max` worker counts for a given `agent_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeBounds {
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    pub strategy: AgentPoolStrategy,
    pub load_balancing: LoadBalancingAlgorithm,
    pub per_type: HashMap<String, TypeBounds>,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub burst_threshold: f64,
    pub enable_auto_scaling: bool,
    pub enable_health_monitoring: bool,
    #[serde(with = "humantime_serde_compat")]
    pub health_check_interval: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub agent_timeout: Duration,
    pub failure_threshold: u32,
    #[serde(with = "humantime_serde_compat")]
    pub recovery_delay: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub shutdown_grace_period: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            strategy: AgentPoolStrategy::Dynamic,
            load_balancing: LoadBalancingAlgorithm::CapabilityBased,
            per_type: HashMap::new(),
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.3,
            burst_threshold: 0.9,
            enable_auto_scaling: true,
            enable_health_monitoring: true,
            health_check_interval: Duration::from_secs(30),
            agent_timeout: Duration::from_secs(30 * 60),
            failure_threshold: 3,
            recovery_delay: Duration::from_secs(60),
            shutdown_grace_period: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    pub fn bounds_for(&self, agent_type: &str) -> TypeBounds {
        self.per_type
            .get(agent_type)
            .cloned()
            .unwrap_or(TypeBounds { min: 0, max: 5 })
    }
}

/// Minimal `Duration` (de)serialization as seconds — avoids pulling in a
/// separate `humantime-serde` dependency for the handful of duration fields
/// `EngineConfig`'s TOML loader needs (spec.md §6 lists these as plain
/// numbers of seconds/minutes, not human-readable strings).
mod humantime_serde_compat {
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
