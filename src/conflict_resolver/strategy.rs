//! Resolution strategy preference ordering and per-strategy semantics
//! (spec.md §4.3).

use crate::model::{ConflictKind, ResolutionStrategy};

/// Preference order for a given conflict kind. `resolve()` walks this list
/// by attempt count, forcing `HUMAN_ESCALATION` once
/// `max_resolution_attempts` is reached.
pub fn preference_order(kind: ConflictKind) -> &'static [ResolutionStrategy] {
    use ResolutionStrategy::*;
    match kind {
        ConflictKind::FileModification => &[Coordination, Serialization, AutoResolve],
        ConflictKind::DependencyViolation => &[Serialization, Coordination],
        ConflictKind::MergeConflict => &[AutoResolve, HumanEscalation],
        ConflictKind::TestConflict => &[Coordination, AutoResolve],
        ConflictKind::ResourceContention => &[Serialization, Coordination],
        ConflictKind::SemanticConflict => &[HumanEscalation, Coordination],
    }
}

/// Picks the strategy for the next resolution attempt: the preference
/// list's entry at `min(attempts, len-1)`, unless `attempts` has already
/// reached `max_resolution_attempts`, in which case `HUMAN_ESCALATION` is
/// forced regardless of kind (spec.md §4.3).
pub fn next_strategy(kind: ConflictKind, attempts: u32, max_resolution_attempts: u32) -> ResolutionStrategy {
    if attempts >= max_resolution_attempts {
        return ResolutionStrategy::HumanEscalation;
    }
    let prefs = preference_order(kind);
    let idx = (attempts as usize).min(prefs.len() - 1);
    prefs[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_modification_prefers_coordination_first() {
        assert_eq!(next_strategy(ConflictKind::FileModification, 0, 3), ResolutionStrategy::Coordination);
    }

    #[test]
    fn escalation_forced_after_max_attempts() {
        assert_eq!(next_strategy(ConflictKind::FileModification, 3, 3), ResolutionStrategy::HumanEscalation);
    }

    #[test]
    fn walks_preference_list_by_attempt_count() {
        assert_eq!(next_strategy(ConflictKind::FileModification, 1, 3), ResolutionStrategy::Serialization);
        assert_eq!(next_strategy(ConflictKind::FileModification, 2, 3), ResolutionStrategy::AutoResolve);
    }
}
