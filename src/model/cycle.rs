//! The `Cycle` aggregate: identity, phase, lifecycle status, and metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::ids::{CycleId, Priority, ResourceId};
use super::phase::Phase;

/// Lifecycle status, orthogonal to `Phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleStatus {
    Pending,
    Blocked,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl CycleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleStatus::Completed | CycleStatus::Failed | CycleStatus::Cancelled
        )
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStatus::Pending => "pending",
            CycleStatus::Blocked => "blocked",
            CycleStatus::Active => "active",
            CycleStatus::Paused => "paused",
            CycleStatus::Completed => "completed",
            CycleStatus::Failed => "failed",
            CycleStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Per-phase task state used to evaluate PSM preconditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskState {
    pub has_failing_tests: bool,
    pub has_passing_tests: bool,
    pub has_test_files: bool,
    pub has_committed_tests: bool,
}

/// Execution metrics accumulated over a cycle's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub transitions: u32,
    pub commits: u32,
    pub total_active_duration_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: CycleId,
    pub story_id: String,
    pub phase: Phase,
    pub status: CycleStatus,
    pub priority: Priority,
    pub dependencies: HashSet<CycleId>,
    pub estimated_duration_s: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub held_resources: HashSet<ResourceId>,
    pub task_state: TaskState,
    pub metrics: CycleMetrics,
    /// Per-phase agent assignment, keyed by the agent type that ran it.
    pub phase_agents: Vec<(Phase, String)>,
}

impl Cycle {
    pub fn new(
        story_id: impl Into<String>,
        priority: Priority,
        dependencies: HashSet<CycleId>,
        estimated_duration_s: Option<f64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            cycle_id: CycleId::new(),
            story_id: story_id.into(),
            phase: Phase::Design,
            status: CycleStatus::Pending,
            priority,
            dependencies,
            estimated_duration_s,
            submitted_at: now,
            started_at: None,
            ended_at: None,
            last_activity: now,
            held_resources: HashSet::new(),
            task_state: TaskState::default(),
            metrics: CycleMetrics::default(),
            phase_agents: Vec::new(),
        }
    }

    /// DESIGN.md open-question #1: progress is any transition or terminal
    /// task completion since `last_activity`. Callers invoke this whenever
    /// such an event occurs; it is not inferred from wall-clock time.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_stuck(&self, timeout_s: i64) -> bool {
        self.status == CycleStatus::Active
            && Utc::now()
                .signed_duration_since(self.last_activity)
                .num_seconds()
                >= timeout_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cycle_starts_pending_in_design() {
        let c = Cycle::new("story-1", Priority::new(5), HashSet::new(), None);
        assert_eq!(c.phase, Phase::Design);
        assert_eq!(c.status, CycleStatus::Pending);
        assert!(c.held_resources.is_empty());
    }
}
