//! The Phase State Machine: per-cycle transition validation/execution,
//! parallel tracking table, dependency graph, and coordination events.
//!
//! A single mutex guards the full `Validate -> MutateState -> EmitEvents`
//! critical section (spec.md §5), and is never held across a suspension
//! point — event emission here is a synchronous call into the injected
//! `EventSink`, not an await.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::events::{CoordinationEventType, CoreEvent, EventSink};
use crate::model::{Command, Cycle, CycleId, DependencyGraph, Phase, TaskState};

use super::error::{PsmError, PsmResult};
use super::transitions::{self, LookupError, ResourceAction};

/// Per-cycle bookkeeping the PSM tracks independently of the `Cycle`
/// aggregate itself (spec.md §4.1 "Parallel tracking").
struct Tracked {
    phase: Phase,
    last_transition_at: chrono::DateTime<Utc>,
    story_id: String,
    coordination_flag: bool,
}

struct Inner {
    tracked: HashMap<CycleId, Tracked>,
    graph: DependencyGraph,
}

pub struct Psm {
    inner: Mutex<Inner>,
    sink: Box<dyn EventSink>,
}

/// Outcome of `Validate`.
pub struct Validation {
    pub new_phase: Phase,
    pub resource_action: ResourceAction,
}

impl Psm {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tracked: HashMap::new(),
                graph: DependencyGraph::new(),
            }),
            sink,
        }
    }

    /// Register a cycle into the parallel-tracking table.
    pub fn register(&self, cycle: &Cycle) {
        let mut inner = self.inner.lock().expect("psm mutex poisoned");
        inner.tracked.insert(
            cycle.cycle_id.clone(),
            Tracked {
                phase: cycle.phase,
                last_transition_at: Utc::now(),
                story_id: cycle.story_id.clone(),
                coordination_flag: false,
            },
        );
        for dep in &cycle.dependencies {
            inner.graph.add_dependency(cycle.cycle_id.clone(), dep.clone());
        }
    }

    /// Unregister a cycle, releasing all its tracking state. Resource locks
    /// themselves are owned by the coordinator; this only drops PSM's view.
    pub fn unregister(&self, cycle_id: &CycleId) {
        let mut inner = self.inner.lock().expect("psm mutex poisoned");
        inner.tracked.remove(cycle_id);
        inner.graph.remove_cycle(cycle_id);
    }

    /// Register a dependency edge; rejects atomically if it would close a
    /// cycle (DESIGN.md open-question #2).
    pub fn register_dependency(&self, cycle_id: &CycleId, depends_on: &CycleId) -> PsmResult<()> {
        let mut inner = self.inner.lock().expect("psm mutex poisoned");
        if inner.graph.add_dependency(cycle_id.clone(), depends_on.clone()) {
            Ok(())
        } else {
            Err(PsmError::CircularDependency(depends_on.clone()))
        }
    }

    /// Dependencies of `cycle_id` whose tracked phase is not `COMMIT` —
    /// i.e. the cycle cannot yet be admitted.
    pub fn unmet_dependencies(&self, cycle_id: &CycleId) -> Vec<CycleId> {
        let inner = self.inner.lock().expect("psm mutex poisoned");
        inner
            .graph
            .dependencies_of(cycle_id)
            .filter(|dep| {
                inner
                    .tracked
                    .get(*dep)
                    .map(|t| !t.phase.is_terminal())
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Validate a command against a cycle's current state without mutating
    /// anything.
    pub fn validate(&self, cycle: &Cycle, command: Command) -> PsmResult<Validation> {
        match transitions::lookup(command, cycle.phase, &cycle.task_state) {
            Ok(resolved) => Ok(Validation {
                new_phase: resolved.new_phase,
                resource_action: resolved.resource_action,
            }),
            Err(LookupError::Illegal { hint }) => Err(PsmError::IllegalTransition {
                command,
                phase: cycle.phase,
                hint,
            }),
            Err(LookupError::PreconditionUnmet { hint }) => Err(PsmError::PreconditionUnmet {
                command,
                phase: cycle.phase,
                hint,
            }),
        }
    }

    /// Execute a transition atomically: on any failure the cycle and the
    /// tracking table are left untouched.
    pub fn transition(&self, cycle: &mut Cycle, command: Command) -> PsmResult<()> {
        let mut inner = self.inner.lock().expect("psm mutex poisoned");

        if !inner.tracked.contains_key(&cycle.cycle_id) {
            return Err(PsmError::UnknownCycle(cycle.cycle_id.clone()));
        }

        let resolved = transitions::lookup(command, cycle.phase, &cycle.task_state).map_err(|e| match e {
            LookupError::Illegal { hint } => PsmError::IllegalTransition {
                command,
                phase: cycle.phase,
                hint,
            },
            LookupError::PreconditionUnmet { hint } => PsmError::PreconditionUnmet {
                command,
                phase: cycle.phase,
                hint,
            },
        })?;

        let old_phase = cycle.phase;
        cycle.phase = resolved.new_phase;
        cycle.touch();
        cycle.metrics.transitions += 1;
        if matches!(command, Command::Commit | Command::CommitTests | Command::CommitCode | Command::CommitRefactor) {
            cycle.metrics.commits += 1;
        }

        let tracked = inner.tracked.get_mut(&cycle.cycle_id).expect("checked above");
        tracked.phase = resolved.new_phase;
        tracked.last_transition_at = Utc::now();
        let story_id = tracked.story_id.clone();

        // Audience for state_change (spec.md §4.1): cycles sharing this
        // story plus cycles that depend on this one.
        let target_cycles: Vec<CycleId> = inner
            .tracked
            .iter()
            .filter(|(id, t)| **id != cycle.cycle_id && t.story_id == story_id)
            .map(|(id, _)| id.clone())
            .chain(inner.graph.dependents_of(&cycle.cycle_id).cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        drop(inner);

        info!(cycle_id = %cycle.cycle_id, %command, from = %old_phase, to = %resolved.new_phase, "phase transition");

        self.sink.publish(CoreEvent::PhaseTransition {
            story_id,
            cycle_id: cycle.cycle_id.clone(),
            old_phase,
            new_phase: resolved.new_phase,
            timestamp: Utc::now(),
        });

        debug!(cycle_id = %cycle.cycle_id, targets = target_cycles.len(), "emitting state_change");
        self.sink.publish(CoreEvent::CoordinationEvent {
            event_id: crate::model::ConflictId::new().to_string(),
            kind: CoordinationEventType::StateChange,
            source_cycle: cycle.cycle_id.clone(),
            target_cycles,
            data: serde_json::json!({ "phase": resolved.new_phase.to_string() }),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Emit `cycle_unblocked` to every dependent whose last blocking
    /// dependency is `completed_cycle`.
    pub fn notify_unblocked(&self, completed_cycle: &CycleId, dependents: &[CycleId]) {
        for dependent in dependents {
            self.sink.publish(CoreEvent::CoordinationEvent {
                event_id: crate::model::ConflictId::new().to_string(),
                kind: CoordinationEventType::CycleUnblocked,
                source_cycle: completed_cycle.clone(),
                target_cycles: vec![dependent.clone()],
                data: serde_json::Value::Null,
                timestamp: Utc::now(),
            });
        }
    }

    /// `get_parallel_status` (spec.md §4.11): per-cycle phase/coordination
    /// snapshot, independent of the coordinator's aggregate status.
    pub fn parallel_status(&self) -> HashMap<CycleId, Phase> {
        let inner = self.inner.lock().expect("psm mutex poisoned");
        inner.tracked.iter().map(|(id, t)| (id.clone(), t.phase)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::model::Priority;
    use std::collections::HashSet;

    fn psm() -> Psm {
        Psm::new(Box::new(NullEventSink))
    }

    #[test]
    fn transition_advances_registered_cycle() {
        let psm = psm();
        let mut cycle = Cycle::new("s1", Priority::new(5), HashSet::new(), None);
        psm.register(&cycle);
        psm.transition(&mut cycle, Command::Next).unwrap();
        assert_eq!(cycle.phase, Phase::TestRed);
        assert_eq!(cycle.metrics.transitions, 1);
    }

    #[test]
    fn transition_rejects_unregistered_cycle() {
        let psm = psm();
        let mut cycle = Cycle::new("s1", Priority::new(5), HashSet::new(), None);
        let err = psm.transition(&mut cycle, Command::Next);
        assert!(matches!(err, Err(PsmError::UnknownCycle(_))));
    }

    #[test]
    fn failed_transition_leaves_cycle_untouched() {
        let psm = psm();
        let mut cycle = Cycle::new("s1", Priority::new(5), HashSet::new(), None);
        psm.register(&cycle);
        let before = cycle.phase;
        let err = psm.transition(&mut cycle, Command::Code);
        assert!(err.is_err());
        assert_eq!(cycle.phase, before);
        assert_eq!(cycle.metrics.transitions, 0);
    }

    #[test]
    fn unmet_dependencies_reports_non_terminal_deps() {
        let psm = psm();
        let dep = Cycle::new("s1", Priority::new(5), HashSet::new(), None);
        psm.register(&dep);
        let mut cycle = Cycle::new("s1", Priority::new(5), HashSet::from([dep.cycle_id.clone()]), None);
        psm.register(&cycle);
        assert_eq!(psm.unmet_dependencies(&cycle.cycle_id), vec![dep.cycle_id.clone()]);

        // Advance dep to COMMIT via `abort` (any phase -> COMMIT) and confirm
        // it drops out of the unmet set once re-registered at its new phase.
        let mut dep = dep;
        psm.transition(&mut dep, Command::Abort).unwrap();
        psm.register(&dep);
        assert!(psm.unmet_dependencies(&cycle.cycle_id).is_empty());
        let _ = &mut cycle;
    }
}
