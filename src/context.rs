//! The context manager collaborator (spec.md §6, out of scope for the core
//! itself — this module only defines the interface the core calls).

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub agent_type: String,
    pub story_id: String,
    pub task: String,
    pub max_tokens: u32,
    pub isolated: bool,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub bundle: serde_json::Value,
    pub preparation_time_s: f64,
    pub cache_hit: bool,
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn prepare_context(&self, request: ContextRequest) -> anyhow::Result<Context>;
}
