use crate::model::{CycleId, ResourceId};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("cycle not found: {0}")]
    CycleNotFound(CycleId),

    #[error("cannot {action} cycle {cycle_id} while it is {status}")]
    IllegalStatus {
        cycle_id: CycleId,
        status: &'static str,
        action: &'static str,
    },

    #[error("resource lock unavailable: {0}")]
    LockUnavailable(ResourceId),

    #[error(transparent)]
    Psm(#[from] crate::psm::PsmError),

    #[error(transparent)]
    WorkerPool(#[from] crate::worker_pool::WorkerPoolError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
