//! Submission queue ordering (spec.md §4.4).

use std::collections::{HashMap, VecDeque};

use crate::model::{Cycle, CycleId, Priority};

/// Inserts `cycle_id` at the first position whose incumbent has a strictly
/// larger priority number (lower priority) — i.e. the queue stays sorted by
/// priority ascending, ties broken by arrival order (spec.md §4.4 `Submit`).
pub fn insert_by_priority(
    queue: &mut VecDeque<CycleId>,
    cycle_id: CycleId,
    priority: Priority,
    priorities: &HashMap<CycleId, Priority>,
) {
    let pos = queue.iter().position(|id| {
        priorities
            .get(id)
            .map(|p| p.get() > priority.get())
            .unwrap_or(false)
    });
    match pos {
        Some(i) => queue.insert(i, cycle_id),
        None => queue.push_back(cycle_id),
    }
}

/// `OptimizeQueue` (spec.md §4.4): stable sort by
/// `(|dependencies|, priority, last_activity)` ascending.
pub fn optimize(queue: &mut VecDeque<CycleId>, cycles: &HashMap<CycleId, Cycle>) {
    let mut entries: Vec<CycleId> = queue.drain(..).collect();
    entries.sort_by(|a, b| {
        let (da, pa, la) = key(a, cycles);
        let (db, pb, lb) = key(b, cycles);
        da.cmp(&db).then(pa.cmp(&pb)).then(la.cmp(&lb))
    });
    queue.extend(entries);
}

fn key(cycle_id: &CycleId, cycles: &HashMap<CycleId, Cycle>) -> (usize, u8, chrono::DateTime<chrono::Utc>) {
    match cycles.get(cycle_id) {
        Some(c) => (c.dependencies.len(), c.priority.get(), c.last_activity),
        None => (usize::MAX, u8::MAX, chrono::DateTime::<chrono::Utc>::MAX_UTC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn inserts_before_lower_priority_entries() {
        let mut queue = VecDeque::new();
        let mut priorities = HashMap::new();
        let low = CycleId::from_string("low"); // priority 8 (low importance)
        let high = CycleId::from_string("high"); // priority 1 (high importance)
        priorities.insert(low.clone(), Priority::new(8));
        priorities.insert(high.clone(), Priority::new(1));

        insert_by_priority(&mut queue, low.clone(), Priority::new(8), &priorities);
        insert_by_priority(&mut queue, high.clone(), Priority::new(1), &priorities);

        assert_eq!(queue.into_iter().collect::<Vec<_>>(), vec![high, low]);
    }

    #[test]
    fn optimize_orders_by_dependency_count_then_priority() {
        let mut cycles = HashMap::new();
        let a = Cycle::new("s1", Priority::new(5), HashSet::new(), None);
        let mut b = Cycle::new("s1", Priority::new(1), HashSet::new(), None);
        b.dependencies.insert(a.cycle_id.clone());
        let a_id = a.cycle_id.clone();
        let b_id = b.cycle_id.clone();
        cycles.insert(a_id.clone(), a);
        cycles.insert(b_id.clone(), b);

        let mut queue = VecDeque::from([b_id.clone(), a_id.clone()]);
        optimize(&mut queue, &cycles);
        assert_eq!(queue.into_iter().collect::<Vec<_>>(), vec![a_id, b_id]);
    }
}
