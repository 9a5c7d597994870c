//! Tasks dispatched by the worker pool.

use serde_json::Value;

use super::ids::{CycleId, Priority, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: TaskId,
    pub agent_type: String,
    pub command: String,
    pub context: Value,
    pub priority: Priority,
    pub cycle_id: Option<CycleId>,
    pub max_retries: u32,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(
        agent_type: impl Into<String>,
        command: impl Into<String>,
        context: Value,
        priority: Priority,
        cycle_id: Option<CycleId>,
        max_retries: u32,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            agent_type: agent_type.into(),
            command: command.into(),
            context,
            priority,
            cycle_id,
            max_retries,
            status: TaskStatus::Pending,
        }
    }
}

/// Outcome of executing a task via the `AgentRuntime` collaborator.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
    pub artifacts: Vec<String>,
    pub execution_time_s: f64,
}
