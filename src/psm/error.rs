use crate::model::{Command, CycleId, Phase};

#[derive(Debug, thiserror::Error)]
pub enum PsmError {
    #[error("unknown cycle {0}")]
    UnknownCycle(CycleId),

    #[error("{command} is illegal from phase {phase}")]
    IllegalTransition {
        command: Command,
        phase: Phase,
        hint: String,
    },

    #[error("precondition unmet for {command} in {phase}: {hint}")]
    PreconditionUnmet {
        command: Command,
        phase: Phase,
        hint: String,
    },

    #[error("dependency {0} would close a cycle")]
    CircularDependency(CycleId),

    #[error("resource lock unavailable: {0}")]
    LockUnavailable(String),
}

pub type PsmResult<T> = Result<T, PsmError>;
