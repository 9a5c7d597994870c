use crate::model::{TaskId, WorkerId};

#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    #[error("no worker available for agent type {0}")]
    NoWorkerAvailable(String),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("cannot scale {agent_type} below minimum {min}")]
    BelowMinimum { agent_type: String, min: usize },

    #[error("cannot scale {agent_type} above maximum {max}")]
    AboveMaximum { agent_type: String, max: usize },
}

pub type WorkerPoolResult<T> = Result<T, WorkerPoolError>;
