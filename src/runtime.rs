//! The agent runtime collaborator (spec.md §6, out of scope for the core
//! itself — this module only defines the interface the core calls).

use async_trait::async_trait;

use crate::model::{Task, TaskOutcome};

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// The set of commands this runtime's agents can execute.
    fn capabilities(&self, agent_type: &str) -> Vec<String>;

    async fn execute(&self, task: Task) -> anyhow::Result<TaskOutcome>;
}
