//! Event taxonomy produced by the core (spec.md §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CycleId, Phase};

pub type EventId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationEventType {
    StateChange,
    CycleUnblocked,
    ResourceRequest,
    ConflictDetected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    PhaseTransition {
        story_id: String,
        cycle_id: CycleId,
        old_phase: Phase,
        new_phase: Phase,
        timestamp: DateTime<Utc>,
    },
    ParallelStatus {
        summary: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    CoordinationEvent {
        event_id: EventId,
        kind: CoordinationEventType,
        source_cycle: CycleId,
        target_cycles: Vec<CycleId>,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
}

impl CoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CoreEvent::PhaseTransition { .. } => "phase_transition",
            CoreEvent::ParallelStatus { .. } => "parallel_status",
            CoreEvent::CoordinationEvent { .. } => "coordination_event",
        }
    }

    pub fn cycle_id(&self) -> Option<&CycleId> {
        match self {
            CoreEvent::PhaseTransition { cycle_id, .. } => Some(cycle_id),
            CoreEvent::ParallelStatus { .. } => None,
            CoreEvent::CoordinationEvent { source_cycle, .. } => Some(source_cycle),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CoreEvent::PhaseTransition { timestamp, .. } => *timestamp,
            CoreEvent::ParallelStatus { timestamp, .. } => *timestamp,
            CoreEvent::CoordinationEvent { timestamp, .. } => *timestamp,
        }
    }
}
