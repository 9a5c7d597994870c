use crate::coordinator::CoordinatorError;
use crate::model::CycleId;
use crate::psm::PsmError;
use crate::worker_pool::WorkerPoolError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cycle not found: {0}")]
    CycleNotFound(CycleId),

    #[error(transparent)]
    Psm(#[from] PsmError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    WorkerPool(#[from] WorkerPoolError),

    #[error("engine is not running")]
    NotRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
