//! Resource lock table (spec.md §3 `ResourceLock`, §4.4 resource
//! acquisition). Files (and the repository lock) are always `EXCLUSIVE`;
//! `"test_runner"` is the one resource the core treats as `SHARED` — spec.md
//! §5 notes `SHARED` is "defined but unused for file paths", implying it is
//! used elsewhere, and a parallelism cap above 1 is meaningless if every
//! cycle's mandatory `test_runner` resource could only ever have one holder.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;

use crate::model::{CycleId, LockMode, ResourceId, ResourceLock, ResourceType};

fn resource_type_for(resource_id: &ResourceId) -> ResourceType {
    let s = resource_id.as_str();
    if s == "test_runner" {
        ResourceType::TestRunner
    } else if s.starts_with("repository:") {
        ResourceType::Repository
    } else {
        ResourceType::File
    }
}

fn lock_mode_for(resource_type: ResourceType) -> LockMode {
    match resource_type {
        ResourceType::TestRunner => LockMode::Shared,
        _ => LockMode::Exclusive,
    }
}

#[derive(Debug, Default)]
pub struct LockTable {
    locks: HashMap<ResourceId, Vec<ResourceLock>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and grants every requested resource, or false and grants
    /// none (spec.md §4.4 atomic acquisition). A `SHARED` resource is
    /// compatible with any number of other `SHARED` holders; an `EXCLUSIVE`
    /// resource is compatible only with an existing lock already held by the
    /// same cycle (a re-acquire/refresh).
    pub fn try_acquire_all(
        &mut self,
        resources: &[ResourceId],
        cycle_id: &CycleId,
        story_id: &str,
        timeout: Duration,
    ) -> bool {
        for resource in resources {
            let mode = lock_mode_for(resource_type_for(resource));
            let active: Vec<&ResourceLock> = self
                .locks
                .get(resource)
                .into_iter()
                .flatten()
                .filter(|l| !l.is_expired())
                .collect();
            let blocked = match mode {
                LockMode::Exclusive => active.iter().any(|l| &l.cycle_id != cycle_id),
                LockMode::Shared => active.iter().any(|l| &l.cycle_id != cycle_id && l.mode == LockMode::Exclusive),
            };
            if blocked {
                return false;
            }
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::seconds(0));
        for resource in resources {
            let resource_type = resource_type_for(resource);
            let mode = lock_mode_for(resource_type);
            let entry = self.locks.entry(resource.clone()).or_default();
            entry.retain(|l| &l.cycle_id != cycle_id);
            entry.push(ResourceLock {
                resource_id: resource.clone(),
                resource_type,
                cycle_id: cycle_id.clone(),
                story_id: story_id.to_string(),
                acquired_at: now,
                expires_at,
                mode,
            });
        }
        true
    }

    pub fn release_all(&mut self, cycle_id: &CycleId) -> HashSet<ResourceId> {
        let mut released = HashSet::new();
        self.locks.retain(|resource_id, holders| {
            let before = holders.len();
            holders.retain(|l| &l.cycle_id != cycle_id);
            if holders.len() != before {
                released.insert(resource_id.clone());
            }
            !holders.is_empty()
        });
        released
    }

    /// Removes every expired lock entry, returning the `(resource, cycle)`
    /// pairs freed (spec.md §4.4 coordination tick step 1).
    pub fn sweep_expired(&mut self) -> Vec<(ResourceId, CycleId)> {
        let mut freed = Vec::new();
        self.locks.retain(|resource_id, holders| {
            let (expired, still_valid): (Vec<_>, Vec<_>) = holders.drain(..).partition(|l| l.is_expired());
            for lock in &expired {
                freed.push((resource_id.clone(), lock.cycle_id.clone()));
            }
            *holders = still_valid;
            !holders.is_empty()
        });
        freed
    }

    pub fn holders_of(&self, resource_id: &ResourceId) -> Vec<CycleId> {
        self.locks
            .get(resource_id)
            .into_iter()
            .flatten()
            .map(|l| l.cycle_id.clone())
            .collect()
    }

    pub fn held_by(&self, cycle_id: &CycleId) -> HashSet<ResourceId> {
        self.locks
            .iter()
            .filter(|(_, holders)| holders.iter().any(|l| &l.cycle_id == cycle_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.locks.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_cycle_cannot_acquire_exclusive_file_lock() {
        let mut table = LockTable::new();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        let path = ResourceId::file("/a.py");

        assert!(table.try_acquire_all(&[path.clone()], &c1, "s1", Duration::from_secs(60)));
        assert!(!table.try_acquire_all(&[path.clone()], &c2, "s1", Duration::from_secs(60)));
    }

    #[test]
    fn test_runner_resource_is_shared_across_cycles() {
        let mut table = LockTable::new();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        let runner = ResourceId::test_runner();

        assert!(table.try_acquire_all(&[runner.clone()], &c1, "s1", Duration::from_secs(60)));
        assert!(table.try_acquire_all(&[runner.clone()], &c2, "s1", Duration::from_secs(60)));
        assert_eq!(table.holders_of(&runner).len(), 2);
    }

    #[test]
    fn release_frees_exclusive_resource_for_others() {
        let mut table = LockTable::new();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        let path = ResourceId::file("/a.py");

        table.try_acquire_all(&[path.clone()], &c1, "s1", Duration::from_secs(60));
        table.release_all(&c1);
        assert!(table.try_acquire_all(&[path], &c2, "s1", Duration::from_secs(60)));
    }

    #[test]
    fn expired_lock_sweeps_and_frees_resource() {
        let mut table = LockTable::new();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        let path = ResourceId::file("/b.py");

        table.try_acquire_all(&[path.clone()], &c1, "s1", Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(5));
        let freed = table.sweep_expired();
        assert_eq!(freed, vec![(path.clone(), c1)]);
        assert!(table.try_acquire_all(&[path], &c2, "s1", Duration::from_secs(60)));
    }

    #[test]
    fn acquisition_is_all_or_nothing() {
        let mut table = LockTable::new();
        let c1 = CycleId::from_string("c1");
        let c2 = CycleId::from_string("c2");
        let a = ResourceId::file("/a.py");
        let b = ResourceId::file("/b.py");

        table.try_acquire_all(&[a.clone()], &c1, "s1", Duration::from_secs(60));
        assert!(!table.try_acquire_all(&[a, b.clone()], &c2, "s1", Duration::from_secs(60)));
        assert!(table.holders_of(&b).is_empty());
    }
}
