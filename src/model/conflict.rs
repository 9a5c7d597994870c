//! Conflicts synthesized by the conflict resolver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use super::ids::{ConflictId, CycleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    FileModification,
    DependencyViolation,
    MergeConflict,
    TestConflict,
    ResourceContention,
    SemanticConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictStatus {
    Detected,
    Analyzing,
    Resolving,
    Resolved,
    Escalated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    AutoResolve,
    Coordination,
    Serialization,
    HumanEscalation,
    AbortCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: ConflictId,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub affected_cycles: HashSet<CycleId>,
    pub affected_files: HashSet<String>,
    pub status: ConflictStatus,
    pub resolution_strategy: Option<ResolutionStrategy>,
    pub attempts: u32,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        severity: Severity,
        affected_cycles: HashSet<CycleId>,
        affected_files: HashSet<String>,
    ) -> Self {
        Self {
            conflict_id: ConflictId::new(),
            kind,
            severity,
            affected_cycles,
            affected_files,
            status: ConflictStatus::Detected,
            resolution_strategy: None,
            attempts: 0,
            detected_at: Utc::now(),
            resolved_at: None,
            metadata: Value::Null,
        }
    }

    pub fn blocks_progress(&self) -> bool {
        self.severity == Severity::Critical && self.status != ConflictStatus::Resolved
    }
}

/// Output of `AnalyzePotentialConflict` (planning, pre-detection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    pub probability: f64,
    pub impact: Severity,
    pub components: Vec<String>,
    pub complexity: Complexity,
    pub recommended_strategy: ResolutionStrategy,
    pub prevention_tips: Vec<String>,
}
