//! Parallel Coordinator configuration (spec.md §4.4, §6).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Conservative,
    Balanced,
    Aggressive,
}

impl ExecutionMode {
    /// Default `(min, max)` parallelism bounds this mode tunes toward
    /// (spec.md §4.4).
    pub fn default_bounds(&self) -> (usize, usize) {
        match self {
            ExecutionMode::Conservative => (2, 3),
            ExecutionMode::Balanced => (3, 4),
            ExecutionMode::Aggressive => (4, 5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub max_parallel_cycles: usize,
    pub execution_mode: ExecutionMode,
    #[serde(with = "duration_secs")]
    pub coordination_check_interval: Duration,
    #[serde(with = "duration_secs")]
    pub resource_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub stuck_after: Duration,
    pub enable_conflict_prevention: bool,
    pub enable_predictive_scheduling: bool,
    pub enable_resource_locking: bool,
    pub enable_coordination_events: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_parallel_cycles: 4,
            execution_mode: ExecutionMode::Balanced,
            coordination_check_interval: Duration::from_secs(5),
            resource_timeout: Duration::from_secs(30 * 60),
            stuck_after: Duration::from_secs(30 * 60),
            enable_conflict_prevention: true,
            enable_predictive_scheduling: false,
            enable_resource_locking: true,
            enable_coordination_events: true,
        }
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
