use crate::model::ConflictId;

#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("conflict not found: {0}")]
    NotFound(ConflictId),

    #[error("resolution strategy {0:?} is not valid for this conflict")]
    InvalidStrategy(crate::model::ResolutionStrategy),

    #[error("abort_cycle requires at least two affected cycles")]
    AbortNeedsMultipleCycles,
}

pub type ConflictResult<T> = Result<T, ConflictError>;
