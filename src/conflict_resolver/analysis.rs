//! `AnalyzePotentialConflict` (spec.md §4.3): pre-detection planning signal
//! used by callers deciding whether to schedule two cycles concurrently.

use crate::model::{Complexity, ConflictAnalysis, ResolutionStrategy, Severity};

use super::detection::assign_severity;

const TEMPORAL_CONCURRENCY_FACTOR: f64 = 0.5;

fn shared_file_factor(path_count: usize) -> f64 {
    (path_count as f64 * 0.15).min(0.8)
}

fn file_type_complexity_factor(paths: &[String]) -> f64 {
    let distinct_extensions: std::collections::HashSet<&str> = paths
        .iter()
        .filter_map(|p| p.rsplit('.').next())
        .collect();
    (distinct_extensions.len() as f64 * 0.2).min(0.7)
}

pub fn analyze_potential_conflict(cycle_a: &str, cycle_b: &str, paths: &[String]) -> ConflictAnalysis {
    let shared = shared_file_factor(paths.len());
    let file_type = file_type_complexity_factor(paths);
    let probability = (shared + TEMPORAL_CONCURRENCY_FACTOR + file_type) / 3.0;

    let impact = paths
        .iter()
        .map(|p| assign_severity(p, 1))
        .max()
        .unwrap_or(Severity::Low);

    let complexity = if probability < 0.33 {
        Complexity::Simple
    } else if probability < 0.66 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    };

    let recommended_strategy = match complexity {
        Complexity::Simple => ResolutionStrategy::AutoResolve,
        Complexity::Moderate => ResolutionStrategy::Coordination,
        Complexity::Complex => ResolutionStrategy::HumanEscalation,
    };

    let mut prevention_tips = vec![format!(
        "cycles {cycle_a} and {cycle_b} share {} file(s); consider serializing writes to them",
        paths.len()
    )];
    if matches!(complexity, Complexity::Complex) {
        prevention_tips.push("split one cycle's scope to avoid the overlap entirely".to_string());
    }

    ConflictAnalysis {
        probability,
        impact,
        components: paths.to_vec(),
        complexity,
        recommended_strategy,
        prevention_tips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_shared_files_raises_probability() {
        let few = analyze_potential_conflict("c1", "c2", &["a.rs".to_string()]);
        let many = analyze_potential_conflict(
            "c1",
            "c2",
            &["a.rs".to_string(), "b.py".to_string(), "c.go".to_string()],
        );
        assert!(many.probability > few.probability);
    }

    #[test]
    fn probability_never_exceeds_one() {
        let paths: Vec<String> = (0..20).map(|i| format!("f{i}.rs")).collect();
        let analysis = analyze_potential_conflict("c1", "c2", &paths);
        assert!(analysis.probability <= 1.0);
    }
}
