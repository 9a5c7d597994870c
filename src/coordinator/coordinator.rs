//! Parallel Coordinator (spec.md §4.4): admits cycles under the parallelism
//! cap, orders the queue by priority, waits for dependencies, acquires
//! resource locks, and drives cycles through the PSM.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::{ContextProvider, ContextRequest};
use crate::conflict_resolver::ConflictResolver;
use crate::events::{CoordinationEventType, CoreEvent, EventSink};
use crate::model::{Command, Cycle, CycleId, CycleStatus, Phase, Priority, ResourceId, TaskOutcome};
use crate::psm::{Psm, ResourceAction};
use crate::runtime::AgentRuntime;
use crate::worker_pool::{TaskResult, WorkerPool, WorkerPoolError};

use super::config::CoordinatorConfig;
use super::error::{CoordinatorError, CoordinatorResult};
use super::locks::LockTable;
use super::queue;

#[derive(Debug, Clone, Default)]
pub struct CoordinatorStatus {
    pub active: usize,
    pub pending: usize,
    pub blocked: usize,
    pub paused: usize,
    pub queue_depth: usize,
    pub utilization: f64,
    pub peak_parallel_cycles: usize,
    pub locks_held: usize,
}

struct Inner {
    cycles: HashMap<CycleId, Cycle>,
    required_resources: HashMap<CycleId, Vec<ResourceId>>,
    priorities: HashMap<CycleId, Priority>,
    queue: VecDeque<CycleId>,
    locks: LockTable,
    running: bool,
    peak_active: usize,
}

pub struct Coordinator<R: AgentRuntime + 'static> {
    config: CoordinatorConfig,
    psm: Arc<Psm>,
    conflict_resolver: Arc<ConflictResolver>,
    worker_pool: Arc<WorkerPool<R>>,
    context_provider: Option<Arc<dyn ContextProvider>>,
    sink: Arc<dyn EventSink>,
    inner: Mutex<Inner>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: AgentRuntime + 'static> Coordinator<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CoordinatorConfig,
        psm: Arc<Psm>,
        conflict_resolver: Arc<ConflictResolver>,
        worker_pool: Arc<WorkerPool<R>>,
        context_provider: Option<Arc<dyn ContextProvider>>,
        sink: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            psm,
            conflict_resolver,
            worker_pool,
            context_provider,
            sink,
            inner: Mutex::new(Inner {
                cycles: HashMap::new(),
                required_resources: HashMap::new(),
                priorities: HashMap::new(),
                queue: VecDeque::new(),
                locks: LockTable::new(),
                running: true,
                peak_active: 0,
            }),
            tick_task: Mutex::new(None),
        })
    }

    /// Spawns the background coordination-tick loop (spec.md §4.4).
    pub async fn start(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.config.coordination_check_interval);
            loop {
                ticker.tick().await;
                if !coordinator.inner.lock().await.running {
                    break;
                }
                coordinator.tick().await;
            }
        });
        *self.tick_task.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.running = false;
    }

    /// `Submit` (spec.md §4.4). `anticipated_paths` is the caller-declared
    /// set of file paths the cycle's tasks will touch — used both for
    /// pre-admission conflict analysis and as the resource set locked on
    /// admission, alongside the implicit `"test_runner"` resource.
    pub async fn submit(
        self: &Arc<Self>,
        story_id: impl Into<String>,
        priority: u8,
        dependencies: HashSet<CycleId>,
        estimated_duration_s: Option<f64>,
        anticipated_paths: Vec<String>,
    ) -> CycleId {
        let priority = Priority::new(priority);
        let cycle = Cycle::new(story_id, priority, dependencies.clone(), estimated_duration_s);
        let cycle_id = cycle.cycle_id.clone();

        self.psm.register(&cycle);
        for dep in &dependencies {
            if let Some(conflict) = self.conflict_resolver.register_cycle_dependency(&cycle_id, dep) {
                warn!(cycle_id = %cycle_id, dep = %dep, conflict_id = %conflict.conflict_id, "dependency would close a cycle");
            }
        }

        let mut required = anticipated_paths
            .iter()
            .map(|p| ResourceId::file(p.clone()))
            .collect::<Vec<_>>();
        required.push(ResourceId::test_runner());

        let mut inner = self.inner.lock().await;
        let blocked = self.would_block_locked(&inner, &cycle, &anticipated_paths);
        let mut cycle = cycle;
        if blocked {
            cycle.status = CycleStatus::Blocked;
        }

        inner.priorities.insert(cycle_id.clone(), priority);
        inner.required_resources.insert(cycle_id.clone(), required);
        let queue_priorities = inner.priorities.clone();
        queue::insert_by_priority(&mut inner.queue, cycle_id.clone(), priority, &queue_priorities);
        inner.cycles.insert(cycle_id.clone(), cycle);

        info!(cycle_id = %cycle_id, priority = priority.get(), "cycle submitted");
        cycle_id
    }

    fn would_block_locked(&self, inner: &Inner, cycle: &Cycle, anticipated_paths: &[String]) -> bool {
        if !self.dependencies_satisfied(cycle, &inner.cycles) {
            return true;
        }
        if anticipated_paths.is_empty() {
            return false;
        }
        for other in inner.cycles.values() {
            if other.status != CycleStatus::Active {
                continue;
            }
            let other_paths: Vec<String> = other
                .held_resources
                .iter()
                .map(|r| r.as_str().to_string())
                .collect();
            if other_paths.is_empty() {
                continue;
            }
            let analysis = self
                .conflict_resolver
                .analyze_potential_conflict(&cycle.cycle_id, &other.cycle_id, anticipated_paths);
            if matches!(analysis.complexity, crate::model::Complexity::Complex) {
                return true;
            }
        }
        false
    }

    fn dependencies_satisfied(&self, cycle: &Cycle, cycles: &HashMap<CycleId, Cycle>) -> bool {
        cycle.dependencies.iter().all(|dep| {
            cycles
                .get(dep)
                .map(|d| d.status == CycleStatus::Completed || d.phase.is_terminal())
                .unwrap_or(false)
        })
    }

    /// Attaches test-result/commit state to a cycle (spec.md S1: "attach a
    /// failing test result", "commit the test file") ahead of issuing the
    /// command whose precondition it satisfies.
    pub async fn set_task_state(
        &self,
        cycle_id: &CycleId,
        mutate: impl FnOnce(&mut crate::model::TaskState),
    ) -> CoordinatorResult<()> {
        let mut inner = self.inner.lock().await;
        let cycle = inner
            .cycles
            .get_mut(cycle_id)
            .ok_or_else(|| CoordinatorError::CycleNotFound(cycle_id.clone()))?;
        mutate(&mut cycle.task_state);
        Ok(())
    }

    /// Issues a command directly against the PSM for `cycle_id`, acquiring
    /// the repository lock first if the transition requires it (spec.md
    /// §4.1 `commit-*` resource action).
    pub async fn issue_command(&self, cycle_id: &CycleId, command: Command) -> CoordinatorResult<Phase> {
        let mut inner = self.inner.lock().await;
        let story_id = inner
            .cycles
            .get(cycle_id)
            .ok_or_else(|| CoordinatorError::CycleNotFound(cycle_id.clone()))?
            .story_id
            .clone();

        let validation = {
            let cycle = inner.cycles.get(cycle_id).expect("checked above");
            self.psm.validate(cycle, command)?
        };

        if validation.resource_action == ResourceAction::AcquireRepositoryLock {
            let repo_resource = ResourceId::repository(&story_id);
            if !inner.locks.try_acquire_all(
                &[repo_resource.clone()],
                cycle_id,
                &story_id,
                self.config.resource_timeout,
            ) {
                return Err(CoordinatorError::LockUnavailable(repo_resource));
            }
            let cycle = inner.cycles.get_mut(cycle_id).expect("checked above");
            cycle.held_resources.insert(repo_resource);
        }

        let cycle = inner.cycles.get_mut(cycle_id).expect("checked above");
        self.psm.transition(cycle, command)?;
        Ok(cycle.phase)
    }

    pub async fn pause(&self, cycle_id: &CycleId) -> CoordinatorResult<()> {
        let mut inner = self.inner.lock().await;
        let cycle = inner
            .cycles
            .get_mut(cycle_id)
            .ok_or_else(|| CoordinatorError::CycleNotFound(cycle_id.clone()))?;
        if cycle.status != CycleStatus::Active {
            return Err(CoordinatorError::IllegalStatus {
                cycle_id: cycle_id.clone(),
                status: status_label(cycle.status),
                action: "pause",
            });
        }
        cycle.status = CycleStatus::Paused;
        Ok(())
    }

    pub async fn resume(&self, cycle_id: &CycleId) -> CoordinatorResult<()> {
        let mut inner = self.inner.lock().await;
        let cycle = inner
            .cycles
            .get_mut(cycle_id)
            .ok_or_else(|| CoordinatorError::CycleNotFound(cycle_id.clone()))?;
        if cycle.status != CycleStatus::Paused {
            return Err(CoordinatorError::IllegalStatus {
                cycle_id: cycle_id.clone(),
                status: status_label(cycle.status),
                action: "resume",
            });
        }
        cycle.status = CycleStatus::Active;
        cycle.touch();
        Ok(())
    }

    pub async fn cancel(&self, cycle_id: &CycleId) -> CoordinatorResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.cycles.contains_key(cycle_id) {
            return Err(CoordinatorError::CycleNotFound(cycle_id.clone()));
        }
        inner.locks.release_all(cycle_id);
        self.psm.unregister(cycle_id);
        inner.required_resources.remove(cycle_id);
        inner.priorities.remove(cycle_id);
        if let Some(pos) = inner.queue.iter().position(|id| id == cycle_id) {
            inner.queue.remove(pos);
        }
        let cycle = inner.cycles.get_mut(cycle_id).expect("checked above");
        cycle.status = CycleStatus::Cancelled;
        cycle.held_resources.clear();
        cycle.ended_at = Some(Utc::now());
        Ok(())
    }

    pub async fn cycle_status(&self, cycle_id: &CycleId) -> Option<Cycle> {
        self.inner.lock().await.cycles.get(cycle_id).cloned()
    }

    pub async fn optimize_queue(&self) {
        let mut inner = self.inner.lock().await;
        let cycles = inner.cycles.clone();
        queue::optimize(&mut inner.queue, &cycles);
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let inner = self.inner.lock().await;
        let mut status = CoordinatorStatus {
            queue_depth: inner.queue.len(),
            peak_parallel_cycles: inner.peak_active,
            locks_held: inner.locks.len(),
            ..Default::default()
        };
        for cycle in inner.cycles.values() {
            match cycle.status {
                CycleStatus::Active => status.active += 1,
                CycleStatus::Pending => status.pending += 1,
                CycleStatus::Blocked => status.blocked += 1,
                CycleStatus::Paused => status.paused += 1,
                _ => {}
            }
        }
        status.utilization = if self.config.max_parallel_cycles == 0 {
            0.0
        } else {
            status.active as f64 / self.config.max_parallel_cycles as f64
        };
        status
    }

    pub async fn resource_status(&self) -> HashMap<ResourceId, CycleId> {
        let inner = self.inner.lock().await;
        inner
            .cycles
            .keys()
            .flat_map(|id| {
                inner
                    .locks
                    .held_by(id)
                    .into_iter()
                    .map(move |r| (r, id.clone()))
            })
            .collect()
    }

    /// Submits a task to the worker pool on behalf of `cycle_id`, asking the
    /// pool to create a worker of `agent_type` first if none exists (spec.md
    /// §4.4 "auto-scaling of WP"), then blocks for its result.
    pub async fn dispatch_agent_task(
        &self,
        cycle_id: &CycleId,
        agent_type: impl Into<String>,
        command: impl Into<String>,
        context: serde_json::Value,
        max_retries: u32,
        timeout: Duration,
    ) -> CoordinatorResult<TaskOutcome> {
        let agent_type = agent_type.into();
        let priority = {
            let inner = self.inner.lock().await;
            inner
                .cycles
                .get(cycle_id)
                .ok_or_else(|| CoordinatorError::CycleNotFound(cycle_id.clone()))?
                .priority
        };

        if let Err(err) = self.worker_pool.ensure_worker(&agent_type).await {
            warn!(%agent_type, error = %err, "could not provision a worker for this agent type");
        }

        let task_id = self
            .worker_pool
            .submit(agent_type.clone(), command, context, priority, Some(cycle_id.clone()), max_retries)
            .await;

        match self.worker_pool.result(&task_id, timeout).await {
            TaskResult::Done(outcome) => Ok(outcome),
            TaskResult::Timeout => Err(CoordinatorError::WorkerPool(WorkerPoolError::NoWorkerAvailable(agent_type))),
            TaskResult::NotFound => Err(CoordinatorError::WorkerPool(WorkerPoolError::TaskNotFound(task_id))),
        }
    }

    /// One coordination tick (spec.md §4.4): expire locks, monitor active
    /// cycles, resolve resource-lock intersections, and fill capacity.
    pub async fn tick(&self) {
        let mut inner = self.inner.lock().await;

        let expired = inner.locks.sweep_expired();
        for (resource, cycle_id) in &expired {
            if let Some(cycle) = inner.cycles.get_mut(cycle_id) {
                cycle.held_resources.remove(resource);
            }
        }

        let active_ids: Vec<CycleId> = inner
            .cycles
            .values()
            .filter(|c| c.status == CycleStatus::Active)
            .map(|c| c.cycle_id.clone())
            .collect();

        let mut newly_completed = Vec::new();
        for cycle_id in &active_ids {
            let stuck = inner
                .cycles
                .get(cycle_id)
                .map(|c| c.is_stuck(self.config.stuck_after.as_secs() as i64))
                .unwrap_or(false);
            if stuck {
                if let Some(cycle) = inner.cycles.get_mut(cycle_id) {
                    warn!(cycle_id = %cycle_id, "cycle stuck, pausing for review");
                    cycle.status = CycleStatus::Paused;
                }
                continue;
            }

            let completed = inner
                .cycles
                .get(cycle_id)
                .map(|c| c.phase.is_terminal())
                .unwrap_or(false);
            if completed {
                inner.locks.release_all(cycle_id);
                self.psm.unregister(cycle_id);
                if let Some(cycle) = inner.cycles.get_mut(cycle_id) {
                    cycle.status = CycleStatus::Completed;
                    cycle.held_resources.clear();
                    cycle.ended_at = Some(Utc::now());
                }
                newly_completed.push(cycle_id.clone());
            }
        }

        for completed_id in &newly_completed {
            let dependents: Vec<CycleId> = inner
                .cycles
                .values()
                .filter(|c| c.dependencies.contains(completed_id) && !c.status.is_terminal())
                .map(|c| c.cycle_id.clone())
                .collect();
            self.psm.notify_unblocked(completed_id, &dependents);
            for dependent in &dependents {
                if let Some(cycle) = inner.cycles.get(dependent) {
                    if self.dependencies_satisfied(cycle, &inner.cycles) {
                        if let Some(cycle) = inner.cycles.get_mut(dependent) {
                            cycle.status = CycleStatus::Pending;
                        }
                    }
                }
            }
        }

        if self.config.enable_conflict_prevention {
            let active_ids: Vec<CycleId> = inner
                .cycles
                .values()
                .filter(|c| c.status == CycleStatus::Active)
                .map(|c| c.cycle_id.clone())
                .collect();
            for i in 0..active_ids.len() {
                for j in (i + 1)..active_ids.len() {
                    let (id_a, id_b) = (&active_ids[i], &active_ids[j]);
                    let (resources_a, resources_b) = (
                        inner.cycles.get(id_a).map(|c| c.held_resources.clone()).unwrap_or_default(),
                        inner.cycles.get(id_b).map(|c| c.held_resources.clone()).unwrap_or_default(),
                    );
                    if resources_a.is_disjoint(&resources_b) {
                        continue;
                    }
                    let (pa, pb) = (
                        inner.cycles.get(id_a).map(|c| c.priority.get()).unwrap_or(10),
                        inner.cycles.get(id_b).map(|c| c.priority.get()).unwrap_or(10),
                    );
                    let loser = if pa >= pb { id_a.clone() } else { id_b.clone() };
                    warn!(cycle_id = %loser, "resource overlap with another active cycle, pausing lower-priority cycle");
                    if let Some(cycle) = inner.cycles.get_mut(&loser) {
                        cycle.status = CycleStatus::Paused;
                    }
                }
            }
        }

        let mut admitted: Vec<(CycleId, String)> = Vec::new();
        loop {
            let active_count = inner.cycles.values().filter(|c| c.status == CycleStatus::Active).count();
            if active_count >= self.config.max_parallel_cycles {
                break;
            }
            let Some(cycle_id) = inner.queue.pop_front() else { break };

            let admissible = match inner.cycles.get(&cycle_id) {
                Some(c) => matches!(c.status, CycleStatus::Pending | CycleStatus::Blocked),
                None => false,
            };
            if !admissible {
                continue;
            }

            let deps_ok = inner
                .cycles
                .get(&cycle_id)
                .map(|c| self.dependencies_satisfied(c, &inner.cycles))
                .unwrap_or(false);
            let blocked_by_conflict = self.conflict_resolver.has_blocking_conflict(&cycle_id);

            if !deps_ok || blocked_by_conflict {
                if let Some(cycle) = inner.cycles.get_mut(&cycle_id) {
                    cycle.status = CycleStatus::Blocked;
                }
                inner.queue.push_front(cycle_id);
                break;
            }

            let required = inner.required_resources.get(&cycle_id).cloned().unwrap_or_default();
            let story_id = inner.cycles.get(&cycle_id).map(|c| c.story_id.clone()).unwrap_or_default();
            let acquired = if self.config.enable_resource_locking {
                inner.locks.try_acquire_all(&required, &cycle_id, &story_id, self.config.resource_timeout)
            } else {
                true
            };
            if !acquired {
                if let Some(cycle) = inner.cycles.get_mut(&cycle_id) {
                    cycle.status = CycleStatus::Blocked;
                }
                inner.queue.push_front(cycle_id);
                break;
            }

            let cycle = inner.cycles.get_mut(&cycle_id).expect("checked above");
            cycle.status = CycleStatus::Active;
            cycle.started_at = Some(Utc::now());
            cycle.held_resources = required.into_iter().collect();
            cycle.touch();
            admitted.push((cycle_id.clone(), cycle.story_id.clone()));

            let active_now = inner.cycles.values().filter(|c| c.status == CycleStatus::Active).count();
            inner.peak_active = inner.peak_active.max(active_now);
        }

        for (cycle_id, story_id) in &admitted {
            if self.config.enable_coordination_events {
                let target_cycles: Vec<CycleId> = inner
                    .cycles
                    .values()
                    .filter(|c| &c.cycle_id != cycle_id && (&c.story_id == story_id || c.dependencies.contains(cycle_id)))
                    .map(|c| c.cycle_id.clone())
                    .collect();
                self.sink.publish(CoreEvent::CoordinationEvent {
                    event_id: crate::model::ConflictId::new().to_string(),
                    kind: CoordinationEventType::StateChange,
                    source_cycle: cycle_id.clone(),
                    target_cycles,
                    data: serde_json::json!({ "admitted": true, "story_id": story_id }),
                    timestamp: Utc::now(),
                });
            }
        }

        let active_count = inner.cycles.values().filter(|c| c.status == CycleStatus::Active).count();
        let utilization = if self.config.max_parallel_cycles == 0 {
            0.0
        } else {
            active_count as f64 / self.config.max_parallel_cycles as f64
        };
        drop(inner);

        for (cycle_id, story_id) in &admitted {
            if let Some(provider) = &self.context_provider {
                let request = ContextRequest {
                    agent_type: "design".to_string(),
                    story_id: story_id.clone(),
                    task: "design".to_string(),
                    max_tokens: 4096,
                    isolated: true,
                };
                match provider.prepare_context(request).await {
                    Ok(ctx) => debug!(cycle_id = %cycle_id, cache_hit = ctx.cache_hit, "context prepared on admission"),
                    Err(err) => warn!(cycle_id = %cycle_id, error = %err, "context preparation failed on admission"),
                }
            }
        }

        self.sink.publish(CoreEvent::ParallelStatus {
            summary: serde_json::json!({ "active": active_count, "utilization": utilization }),
            timestamp: Utc::now(),
        });
    }
}

fn status_label(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Pending => "pending",
        CycleStatus::Blocked => "blocked",
        CycleStatus::Active => "active",
        CycleStatus::Paused => "paused",
        CycleStatus::Completed => "completed",
        CycleStatus::Failed => "failed",
        CycleStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict_resolver::ConflictResolverConfig;
    use crate::events::NullEventSink;
    use crate::model::{Task, TaskState};
    use crate::worker_pool::WorkerPoolConfig;
    use async_trait::async_trait;

    struct NoopRuntime;

    #[async_trait]
    impl AgentRuntime for NoopRuntime {
        fn capabilities(&self, _agent_type: &str) -> Vec<String> {
            vec![]
        }

        async fn execute(&self, _task: Task) -> anyhow::Result<TaskOutcome> {
            Ok(TaskOutcome {
                success: true,
                output: serde_json::Value::Null,
                error: None,
                artifacts: vec![],
                execution_time_s: 0.0,
            })
        }
    }

    fn coordinator(max_parallel: usize) -> Arc<Coordinator<NoopRuntime>> {
        let psm = Arc::new(Psm::new(Box::new(NullEventSink)));
        let conflict_resolver = Arc::new(ConflictResolver::new(ConflictResolverConfig::default(), Arc::new(NullEventSink)));
        let worker_pool = WorkerPool::new(Arc::new(NoopRuntime), WorkerPoolConfig::default());
        let mut config = CoordinatorConfig::default();
        config.max_parallel_cycles = max_parallel;
        Coordinator::new(config, psm, conflict_resolver, worker_pool, None, Arc::new(NullEventSink))
    }

    // S2 — dependency ordering: C2 depends on C1; C2 stays BLOCKED until C1
    // reaches COMMIT.
    #[tokio::test]
    async fn dependency_blocks_until_upstream_commits() {
        let coordinator = coordinator(2);
        let c1 = coordinator.submit("s1", 5, HashSet::new(), None, vec![]).await;
        let c2 = coordinator
            .submit("s1", 5, HashSet::from([c1.clone()]), None, vec![])
            .await;

        coordinator.tick().await;
        assert_eq!(coordinator.cycle_status(&c1).await.unwrap().status, CycleStatus::Active);
        assert_eq!(coordinator.cycle_status(&c2).await.unwrap().status, CycleStatus::Blocked);

        // Drive C1 straight to COMMIT via `abort` (legal from any phase).
        coordinator.issue_command(&c1, Command::Abort).await.unwrap();
        coordinator.tick().await;

        assert_eq!(coordinator.cycle_status(&c1).await.unwrap().status, CycleStatus::Completed);
        coordinator.tick().await;
        assert_eq!(coordinator.cycle_status(&c2).await.unwrap().status, CycleStatus::Active);
    }

    // S5 — parallel cap under pressure: 6 independent cycles with priorities
    // [1,1,2,2,3,3], cap 3. The two priority-1 cycles and the first
    // priority-2 cycle (lowest arrival-order tie-break) are admitted; the
    // remaining three stay queued.
    #[tokio::test]
    async fn parallelism_cap_limits_admission() {
        let coordinator = coordinator(3);
        let mut ids = Vec::new();
        for priority in [1u8, 1, 2, 2, 3, 3] {
            ids.push(coordinator.submit("s1", priority, HashSet::new(), None, vec![]).await);
        }
        coordinator.tick().await;

        let mut statuses = Vec::new();
        for id in &ids {
            statuses.push(coordinator.cycle_status(id).await.unwrap().status);
        }
        assert_eq!(
            statuses,
            vec![
                CycleStatus::Active,
                CycleStatus::Active,
                CycleStatus::Active,
                CycleStatus::Pending,
                CycleStatus::Pending,
                CycleStatus::Pending,
            ]
        );
    }

    #[tokio::test]
    async fn issue_command_requires_registered_cycle() {
        let coordinator = coordinator(2);
        let bogus = CycleId::from_string("cycle-bogus");
        let err = coordinator.issue_command(&bogus, Command::Next).await;
        assert!(matches!(err, Err(CoordinatorError::CycleNotFound(_))));
    }

    #[tokio::test]
    async fn cancel_releases_locks_and_removes_from_queue() {
        let coordinator = coordinator(1);
        let c1 = coordinator.submit("s1", 5, HashSet::new(), None, vec!["/a.py".to_string()]).await;
        coordinator.tick().await;
        assert_eq!(coordinator.cycle_status(&c1).await.unwrap().status, CycleStatus::Active);

        coordinator.cancel(&c1).await.unwrap();
        let cycle = coordinator.cycle_status(&c1).await.unwrap();
        assert_eq!(cycle.status, CycleStatus::Cancelled);
        assert!(cycle.held_resources.is_empty());
    }

    #[test]
    fn task_state_default_blocks_code_without_failing_tests() {
        let state = TaskState::default();
        assert!(!state.has_failing_tests);
    }
}
