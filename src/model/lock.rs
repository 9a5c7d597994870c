//! Resource locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CycleId, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    File,
    Directory,
    Agent,
    TestRunner,
    Repository,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    pub cycle_id: CycleId,
    pub story_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub mode: LockMode,
}

impl ResourceLock {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
