//! Load-balancing algorithms (spec.md §4.2): given a set of candidate
//! workers for an agent type, pick the one that should receive the next
//! task.

use crate::model::{Priority, Worker};

use super::config::LoadBalancingAlgorithm;

/// Per-type round-robin cursor. Kept outside `Worker` because it tracks
/// dispatch order across the whole type, not per-worker state.
#[derive(Debug, Default)]
pub struct RoundRobinCursor(usize);

impl RoundRobinCursor {
    pub fn next(&mut self, candidate_count: usize) -> usize {
        if candidate_count == 0 {
            return 0;
        }
        let idx = self.0 % candidate_count;
        self.0 = self.0.wrapping_add(1);
        idx
    }
}

fn recent_activity_bonus(worker: &Worker) -> f64 {
    (10.0 - worker.minutes_since_last_task()).max(0.0)
}

fn capability_score(worker: &Worker) -> f64 {
    worker.metrics.success_rate() / 10.0 + recent_activity_bonus(worker)
        - 10.0 * worker.load_factor()
        - worker.metrics.error_rate()
}

fn priority_weighted_load_score(worker: &Worker) -> f64 {
    0.3 * worker.metrics.total_tasks as f64 - worker.minutes_since_last_task()
        + 10.0 * worker.metrics.error_rate()
}

/// Select the candidate worker index to dispatch to, given the algorithm in
/// effect and the task's priority (only `PRIORITY_WEIGHTED` reads it).
pub fn select<'a>(
    algorithm: LoadBalancingAlgorithm,
    candidates: &'a [&'a Worker],
    priority: Priority,
    round_robin: &mut RoundRobinCursor,
) -> Option<&'a Worker> {
    if candidates.is_empty() {
        return None;
    }

    match algorithm {
        LoadBalancingAlgorithm::RoundRobin => {
            let idx = round_robin.next(candidates.len());
            Some(candidates[idx])
        }
        LoadBalancingAlgorithm::LeastLoaded => candidates
            .iter()
            .copied()
            .min_by(|a, b| a.load_factor().total_cmp(&b.load_factor())),
        LoadBalancingAlgorithm::CapabilityBased => candidates
            .iter()
            .copied()
            .max_by(|a, b| capability_score(a).total_cmp(&capability_score(b))),
        LoadBalancingAlgorithm::PriorityWeighted => {
            if priority.get() <= 3 {
                candidates
                    .iter()
                    .copied()
                    .min_by(|a, b| a.load_factor().total_cmp(&b.load_factor()))
            } else {
                candidates
                    .iter()
                    .copied()
                    .min_by(|a, b| priority_weighted_load_score(a).total_cmp(&priority_weighted_load_score(b)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Worker;

    #[test]
    fn least_loaded_picks_emptiest_worker() {
        let mut busy = Worker::new("coder", 4);
        busy.current_tasks.insert(crate::model::TaskId::new());
        busy.current_tasks.insert(crate::model::TaskId::new());
        let idle = Worker::new("coder", 4);
        let candidates = [&busy, &idle];
        let mut cursor = RoundRobinCursor::default();
        let picked = select(LoadBalancingAlgorithm::LeastLoaded, &candidates, Priority::new(5), &mut cursor).unwrap();
        assert_eq!(picked.worker_id, idle.worker_id);
    }

    #[test]
    fn round_robin_cycles() {
        let mut cursor = RoundRobinCursor::default();
        assert_eq!(cursor.next(3), 0);
        assert_eq!(cursor.next(3), 1);
        assert_eq!(cursor.next(3), 2);
        assert_eq!(cursor.next(3), 0);
    }

    #[test]
    fn priority_weighted_uses_least_loaded_for_high_priority() {
        let mut busy = Worker::new("coder", 4);
        busy.current_tasks.insert(crate::model::TaskId::new());
        let idle = Worker::new("coder", 4);
        let candidates = [&busy, &idle];
        let mut cursor = RoundRobinCursor::default();
        let picked = select(LoadBalancingAlgorithm::PriorityWeighted, &candidates, Priority::new(1), &mut cursor).unwrap();
        assert_eq!(picked.worker_id, idle.worker_id);
    }
}
