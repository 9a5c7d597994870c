//! Conflict Resolver (spec.md §4.3): modification log, conflict synthesis,
//! and resolution strategy execution.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{CoordinationEventType, CoreEvent, EventSink};
use crate::model::{
    Conflict, ConflictId, ConflictKind, ConflictStatus, CycleId, DependencyGraph, FileModification,
    LineRange, ModificationKind, ResolutionStrategy,
};

use super::analysis::analyze_potential_conflict;
use super::detection::{assign_severity, content_hash, is_python_like, modifications_conflict, semantic_scan};
use super::error::{ConflictError, ConflictResult};
use super::stats::ResolutionStats;
use super::strategy::next_strategy;

#[derive(Debug, Clone)]
pub struct ConflictResolverConfig {
    pub max_resolution_attempts: u32,
    pub enable_semantic_analysis: bool,
    pub enable_auto_resolution: bool,
    pub enable_proactive_detection: bool,
    pub proactive_scan_interval: Duration,
    pub proactive_window: Duration,
}

impl Default for ConflictResolverConfig {
    fn default() -> Self {
        Self {
            max_resolution_attempts: 3,
            enable_semantic_analysis: true,
            enable_auto_resolution: true,
            enable_proactive_detection: true,
            proactive_scan_interval: Duration::from_secs(30),
            proactive_window: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub strategy_used: ResolutionStrategy,
    pub requires_verification: bool,
    pub note: String,
}

struct Inner {
    modifications: Vec<FileModification>,
    conflicts: HashMap<ConflictId, Conflict>,
    dependency_graph: DependencyGraph,
    stats: ResolutionStats,
}

pub struct ConflictResolver {
    config: ConflictResolverConfig,
    sink: Arc<dyn EventSink>,
    inner: Mutex<Inner>,
}

impl ConflictResolver {
    pub fn new(config: ConflictResolverConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            inner: Mutex::new(Inner {
                modifications: Vec::new(),
                conflicts: HashMap::new(),
                dependency_graph: DependencyGraph::new(),
                stats: ResolutionStats::default(),
            }),
        }
    }

    /// `RegisterFileModification` (spec.md §4.3): computes a content hash,
    /// optionally runs the semantic prefix-scan, appends the modification,
    /// then scans for newly-formed conflicts on that path.
    #[allow(clippy::too_many_arguments)]
    pub fn register_file_modification(
        &self,
        file_path: impl Into<String>,
        cycle_id: CycleId,
        story_id: impl Into<String>,
        kind: ModificationKind,
        content: Option<&str>,
        line_ranges: Vec<LineRange>,
    ) -> Vec<Conflict> {
        let file_path = file_path.into();
        let story_id = story_id.into();

        let (functions_touched, classes_touched, imports_touched) =
            if self.config.enable_semantic_analysis && is_python_like(&file_path) {
                content.map(semantic_scan).unwrap_or_default()
            } else {
                Default::default()
            };

        let modification = FileModification {
            file_path: file_path.clone(),
            cycle_id,
            story_id,
            kind,
            content_hash: content.map(content_hash),
            timestamp: Utc::now(),
            line_ranges,
            functions_touched,
            classes_touched,
            imports_touched,
        };

        let mut inner = self.inner.lock().expect("conflict resolver mutex poisoned");
        inner.modifications.push(modification);
        self.scan_path_locked(&mut inner, &file_path)
    }

    /// Scans every pair of modifications on `file_path` from distinct
    /// cycles; creates a new `Conflict` for any pair whose signature
    /// (cycle pair, path) isn't already covered by an active (non-terminal)
    /// conflict — satisfying invariant 7 (resolved conflicts aren't
    /// resurrected without a fresh modification).
    fn scan_path_locked(&self, inner: &mut Inner, file_path: &str) -> Vec<Conflict> {
        let mods_for_path: Vec<&FileModification> = inner
            .modifications
            .iter()
            .filter(|m| m.file_path == file_path)
            .collect();
        let modification_count = mods_for_path.len();

        let mut new_conflicts = Vec::new();
        for i in 0..mods_for_path.len() {
            for j in (i + 1)..mods_for_path.len() {
                let a = mods_for_path[i];
                let b = mods_for_path[j];
                if a.cycle_id == b.cycle_id {
                    continue;
                }
                if !modifications_conflict(a, b) {
                    continue;
                }
                let cycles: HashSet<CycleId> = [a.cycle_id.clone(), b.cycle_id.clone()].into_iter().collect();
                let files: HashSet<String> = [file_path.to_string()].into_iter().collect();

                let already_active = inner.conflicts.values().any(|c| {
                    c.kind == ConflictKind::FileModification
                        && c.affected_cycles == cycles
                        && c.affected_files == files
                        && !matches!(c.status, ConflictStatus::Resolved | ConflictStatus::Failed)
                });
                if already_active {
                    continue;
                }

                let severity = assign_severity(file_path, modification_count);
                let conflict = Conflict::new(ConflictKind::FileModification, severity, cycles, files);
                info!(conflict_id = %conflict.conflict_id, %file_path, %severity, "file modification conflict detected");
                self.sink.publish(CoreEvent::CoordinationEvent {
                    event_id: conflict.conflict_id.to_string(),
                    kind: CoordinationEventType::ConflictDetected,
                    source_cycle: a.cycle_id.clone(),
                    target_cycles: vec![b.cycle_id.clone()],
                    data: serde_json::json!({ "file_path": file_path, "severity": severity.to_string() }),
                    timestamp: Utc::now(),
                });
                inner.conflicts.insert(conflict.conflict_id.clone(), conflict.clone());
                new_conflicts.push(conflict);
            }
        }
        new_conflicts
    }

    /// `RegisterCycleDependency` (spec.md §4.3). Synthesizes a
    /// `DEPENDENCY_VIOLATION` conflict if the edge would close a cycle;
    /// the edge itself is rejected (never inserted), matching
    /// `DependencyGraph::add_dependency`'s atomic-rejection contract.
    pub fn register_cycle_dependency(&self, cycle_id: &CycleId, depends_on: &CycleId) -> Option<Conflict> {
        let mut inner = self.inner.lock().expect("conflict resolver mutex poisoned");
        if inner.dependency_graph.add_dependency(cycle_id.clone(), depends_on.clone()) {
            return None;
        }
        let cycles: HashSet<CycleId> = [cycle_id.clone(), depends_on.clone()].into_iter().collect();
        let conflict = Conflict::new(ConflictKind::DependencyViolation, crate::model::Severity::High, cycles, HashSet::new());
        warn!(cycle_id = %cycle_id, depends_on = %depends_on, "dependency edge would close a cycle");
        inner.conflicts.insert(conflict.conflict_id.clone(), conflict.clone());
        Some(conflict)
    }

    /// `AnalyzePotentialConflict` (spec.md §4.3).
    pub fn analyze_potential_conflict(&self, cycle_a: &CycleId, cycle_b: &CycleId, paths: &[String]) -> crate::model::ConflictAnalysis {
        analyze_potential_conflict(cycle_a.as_str(), cycle_b.as_str(), paths)
    }

    pub fn conflict(&self, conflict_id: &ConflictId) -> Option<Conflict> {
        self.inner.lock().expect("conflict resolver mutex poisoned").conflicts.get(conflict_id).cloned()
    }

    /// Whether any `CRITICAL` conflict affecting `cycle_id` is still
    /// unresolved — blocks every affected cycle from advancing (spec.md §3
    /// `Conflict` invariants).
    pub fn has_blocking_conflict(&self, cycle_id: &CycleId) -> bool {
        let inner = self.inner.lock().expect("conflict resolver mutex poisoned");
        inner
            .conflicts
            .values()
            .any(|c| c.affected_cycles.contains(cycle_id) && c.blocks_progress())
    }

    /// Attempts one resolution step for `conflict_id`, walking the
    /// per-kind preference order by attempt count (spec.md §4.3).
    pub fn resolve(&self, conflict_id: &ConflictId) -> ConflictResult<ResolutionOutcome> {
        let started = std::time::Instant::now();
        let mut inner = self.inner.lock().expect("conflict resolver mutex poisoned");
        let conflict = inner
            .conflicts
            .get(conflict_id)
            .cloned()
            .ok_or_else(|| ConflictError::NotFound(conflict_id.clone()))?;

        let strategy = next_strategy(conflict.kind, conflict.attempts, self.config.max_resolution_attempts);
        let outcome = self.apply_strategy(&conflict, strategy);

        let entry = inner.conflicts.get_mut(conflict_id).expect("checked above");
        entry.attempts += 1;
        entry.resolution_strategy = Some(strategy);

        if outcome.success {
            match strategy {
                ResolutionStrategy::HumanEscalation => {
                    entry.status = ConflictStatus::Escalated;
                    entry.metadata = serde_json::json!({ "human_intervention_required": true });
                    inner.stats.escalated += 1;
                }
                _ => {
                    entry.status = ConflictStatus::Resolved;
                    entry.resolved_at = Some(Utc::now());
                    if strategy == ResolutionStrategy::AutoResolve {
                        inner.stats.auto_resolved += 1;
                    }
                }
            }
        } else {
            inner.stats.failed += 1;
        }
        inner.stats.record_resolution_time(started.elapsed().as_secs_f64());

        debug!(conflict_id = %conflict_id, ?strategy, success = outcome.success, "resolution attempt");
        Ok(outcome)
    }

    fn apply_strategy(&self, conflict: &Conflict, strategy: ResolutionStrategy) -> ResolutionOutcome {
        match strategy {
            ResolutionStrategy::AutoResolve => {
                let eligible = match conflict.kind {
                    ConflictKind::FileModification => conflict.affected_cycles.len() <= 2,
                    _ => true,
                };
                if eligible && self.config.enable_auto_resolution {
                    for cycle in &conflict.affected_cycles {
                        self.sink.publish(CoreEvent::CoordinationEvent {
                            event_id: conflict.conflict_id.to_string(),
                            kind: CoordinationEventType::StateChange,
                            source_cycle: cycle.clone(),
                            target_cycles: vec![],
                            data: serde_json::json!({ "auto_merge": true }),
                            timestamp: Utc::now(),
                        });
                    }
                    ResolutionOutcome {
                        success: true,
                        strategy_used: strategy,
                        requires_verification: false,
                        note: "auto-merged, signalled to agent runtime".to_string(),
                    }
                } else {
                    ResolutionOutcome {
                        success: false,
                        strategy_used: strategy,
                        requires_verification: false,
                        note: "auto-resolve not permitted for this conflict".to_string(),
                    }
                }
            }
            ResolutionStrategy::Coordination => {
                for cycle in &conflict.affected_cycles {
                    self.sink.publish(CoreEvent::CoordinationEvent {
                        event_id: conflict.conflict_id.to_string(),
                        kind: CoordinationEventType::StateChange,
                        source_cycle: cycle.clone(),
                        target_cycles: conflict.affected_cycles.iter().cloned().collect(),
                        data: serde_json::json!({ "advisory": "coordinate before proceeding" }),
                        timestamp: Utc::now(),
                    });
                }
                ResolutionOutcome {
                    success: true,
                    strategy_used: strategy,
                    requires_verification: true,
                    note: "advisory messages sent to affected cycles".to_string(),
                }
            }
            ResolutionStrategy::Serialization => {
                let mut ordered: Vec<CycleId> = conflict.affected_cycles.iter().cloned().collect();
                ordered.sort();
                let deferred: Vec<CycleId> = ordered.into_iter().skip(1).collect();
                for cycle in &deferred {
                    self.sink.publish(CoreEvent::CoordinationEvent {
                        event_id: conflict.conflict_id.to_string(),
                        kind: CoordinationEventType::ResourceRequest,
                        source_cycle: cycle.clone(),
                        target_cycles: vec![],
                        data: serde_json::json!({ "deferred": true }),
                        timestamp: Utc::now(),
                    });
                }
                ResolutionOutcome {
                    success: true,
                    strategy_used: strategy,
                    requires_verification: false,
                    note: format!("serialized: deferred {} cycle(s)", deferred.len()),
                }
            }
            ResolutionStrategy::HumanEscalation => ResolutionOutcome {
                success: true,
                strategy_used: strategy,
                requires_verification: true,
                note: "escalated to human operator".to_string(),
            },
            ResolutionStrategy::AbortCycle => {
                if conflict.affected_cycles.len() < 2 {
                    return ResolutionOutcome {
                        success: false,
                        strategy_used: strategy,
                        requires_verification: false,
                        note: "abort_cycle requires at least two affected cycles".to_string(),
                    };
                }
                let aborted = conflict.affected_cycles.iter().max().cloned();
                ResolutionOutcome {
                    success: true,
                    strategy_used: strategy,
                    requires_verification: false,
                    note: format!("aborted cycle {}", aborted.map(|c| c.to_string()).unwrap_or_default()),
                }
            }
        }
    }

    /// Proactive detection loop (spec.md §4.3): every
    /// `proactive_scan_interval`, re-scan paths modified within
    /// `proactive_window` for newly formed conflicts, auto-resolving any
    /// newly-detected `LOW`/`MEDIUM` severity ones.
    pub fn start_proactive_loop(self: &Arc<Self>) {
        if !self.config.enable_proactive_detection {
            return;
        }
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(resolver.config.proactive_scan_interval);
            loop {
                ticker.tick().await;
                resolver.proactive_scan_pass();
            }
        });
    }

    fn proactive_scan_pass(&self) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.proactive_window).unwrap_or_default();
        let recent_paths: HashSet<String> = {
            let inner = self.inner.lock().expect("conflict resolver mutex poisoned");
            inner
                .modifications
                .iter()
                .filter(|m| m.timestamp >= cutoff)
                .map(|m| m.file_path.clone())
                .collect()
        };

        for path in recent_paths {
            let newly_detected = {
                let mut inner = self.inner.lock().expect("conflict resolver mutex poisoned");
                self.scan_path_locked(&mut inner, &path)
            };
            for conflict in newly_detected {
                if matches!(conflict.severity, crate::model::Severity::Low | crate::model::Severity::Medium) {
                    let _ = self.resolve(&conflict.conflict_id);
                }
            }
        }
    }

    pub fn resolution_stats(&self) -> ResolutionStats {
        self.inner.lock().expect("conflict resolver mutex poisoned").stats.clone()
    }

    pub fn conflicts_detected(&self) -> usize {
        self.inner.lock().expect("conflict resolver mutex poisoned").conflicts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::model::ModificationKind;

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(ConflictResolverConfig::default(), Arc::new(NullEventSink))
    }

    #[test]
    fn overlapping_functions_produce_one_conflict() {
        let r = resolver();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");

        let src = "def f():\n    pass\n";
        r.register_file_modification("/a.py", c1.clone(), "s1", ModificationKind::Modify, Some(src), vec![]);
        let conflicts = r.register_file_modification("/a.py", c2.clone(), "s1", ModificationKind::Modify, Some(src), vec![]);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].affected_cycles, HashSet::from([c1, c2]));
        assert_eq!(conflicts[0].severity, crate::model::Severity::Medium);
    }

    #[test]
    fn non_overlapping_modifications_produce_no_conflict() {
        let r = resolver();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        r.register_file_modification(
            "/a.rs",
            c1,
            "s1",
            ModificationKind::Modify,
            None,
            vec![LineRange { start: 1, end: 5 }],
        );
        let conflicts = r.register_file_modification(
            "/a.rs",
            c2,
            "s1",
            ModificationKind::Modify,
            None,
            vec![LineRange { start: 10, end: 15 }],
        );
        assert!(conflicts.is_empty());
    }

    #[test]
    fn circular_dependency_synthesizes_violation_conflict() {
        let r = resolver();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        assert!(r.register_cycle_dependency(&c1, &c2).is_none());
        let conflict = r.register_cycle_dependency(&c2, &c1);
        assert!(conflict.is_some());
        assert_eq!(conflict.unwrap().kind, ConflictKind::DependencyViolation);
    }

    #[test]
    fn auto_resolve_rejected_for_more_than_two_cycles() {
        let r = resolver();
        let cycles: HashSet<CycleId> = (0..3).map(|i| CycleId::from_string(format!("c{i}"))).collect();
        let conflict = Conflict::new(ConflictKind::FileModification, crate::model::Severity::Low, cycles, HashSet::new());
        let outcome = r.apply_strategy(&conflict, ResolutionStrategy::AutoResolve);
        assert!(!outcome.success);
    }

    #[test]
    fn resolve_escalates_after_max_attempts() {
        let r = resolver();
        let cycles: HashSet<CycleId> = [CycleId::from_string("c1"), CycleId::from_string("c2")].into_iter().collect();
        let conflict = Conflict::new(ConflictKind::SemanticConflict, crate::model::Severity::High, cycles, HashSet::new());
        let conflict_id = conflict.conflict_id.clone();
        r.inner.lock().unwrap().conflicts.insert(conflict_id.clone(), conflict);

        // SemanticConflict prefers HumanEscalation first, so this resolves immediately.
        let outcome = r.resolve(&conflict_id).unwrap();
        assert_eq!(outcome.strategy_used, ResolutionStrategy::HumanEscalation);
        assert_eq!(r.conflict(&conflict_id).unwrap().status, ConflictStatus::Escalated);
    }
}
