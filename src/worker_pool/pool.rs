//! Worker Pool (spec.md §4.2): owns typed worker bookkeeping entries,
//! accepts tasks, dispatches via a load-balancing algorithm, scales worker
//! counts to load, and runs health monitoring/recovery.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{
    CycleId, Priority, Task, TaskId, TaskOutcome, TaskStatus, Worker, WorkerId, WorkerStatus,
};
use crate::runtime::AgentRuntime;

use super::balancing::{self, RoundRobinCursor};
use super::config::WorkerPoolConfig;
use super::error::{WorkerPoolError, WorkerPoolResult};

/// `WP::Result` outcome discriminant, matching spec.md §4.2's
/// `Result | Timeout | NotFound`.
#[derive(Debug)]
pub enum TaskResult {
    Done(TaskOutcome),
    Timeout,
    NotFound,
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ScaleReport {
    pub added: usize,
    pub removed: usize,
    pub duration_s: f64,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct TypeStatus {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub failed: usize,
    pub avg_load: f64,
    pub success_rate: f64,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PoolStatus {
    pub per_type: HashMap<String, TypeStatus>,
    pub queue_depth: usize,
    pub utilization: f64,
}

struct Inner {
    workers: HashMap<WorkerId, Worker>,
    queue: VecDeque<Task>,
    statuses: HashMap<TaskId, TaskStatus>,
    outcomes: HashMap<TaskId, TaskOutcome>,
    round_robin: HashMap<String, RoundRobinCursor>,
    running: bool,
}

/// Typed pool of agent workers. Generic over the injected `AgentRuntime` so
/// tests can supply a fake executor (spec.md §6 treats the runtime as an
/// opaque collaborator).
pub struct WorkerPool<R: AgentRuntime + 'static> {
    runtime: Arc<R>,
    config: WorkerPoolConfig,
    inner: Mutex<Inner>,
    notify: Notify,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: AgentRuntime + 'static> WorkerPool<R> {
    pub fn new(runtime: Arc<R>, config: WorkerPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            config,
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                queue: VecDeque::new(),
                statuses: HashMap::new(),
                outcomes: HashMap::new(),
                round_robin: HashMap::new(),
                running: true,
            }),
            notify: Notify::new(),
            health_task: Mutex::new(None),
        })
    }

    /// Start the health-monitoring background loop (spec.md §4.2).
    pub async fn start(self: &Arc<Self>) {
        if !self.config.enable_health_monitoring {
            return;
        }
        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pool.config.health_check_interval);
            loop {
                ticker.tick().await;
                if !pool.inner.lock().await.running {
                    break;
                }
                pool.health_check_pass().await;
            }
        });
        *self.health_task.lock().await = Some(handle);
    }

    /// `WP::Submit` (spec.md §4.2). Dispatches immediately if a worker of
    /// the requested type has capacity, otherwise queues.
    pub async fn submit(
        self: &Arc<Self>,
        agent_type: impl Into<String>,
        command: impl Into<String>,
        context: serde_json::Value,
        priority: Priority,
        cycle_id: Option<CycleId>,
        max_retries: u32,
    ) -> TaskId {
        let task = Task::new(agent_type, command, context, priority, cycle_id, max_retries);
        let task_id = task.task_id.clone();

        let mut inner = self.inner.lock().await;
        inner.statuses.insert(task_id.clone(), TaskStatus::Pending);
        let dispatch = self.pick_worker_locked(&mut inner, &task);
        match dispatch {
            Some(worker_id) => {
                let worker = inner.workers.get_mut(&worker_id).expect("picked from table");
                worker.current_tasks.insert(task.task_id.clone());
                worker.status = WorkerStatus::Busy;
                inner.statuses.insert(task.task_id.clone(), TaskStatus::InProgress);
                drop(inner);
                self.spawn_execution(worker_id, task);
            }
            None => {
                debug!(task_id = %task.task_id, agent_type = %task.agent_type, "no worker available, queueing task");
                inner.queue.push_back(task);
            }
        }

        task_id
    }

    fn pick_worker_locked(&self, inner: &mut Inner, task: &Task) -> Option<WorkerId> {
        let candidate_ids: Vec<WorkerId> = inner
            .workers
            .values()
            .filter(|w| w.agent_type == task.agent_type && w.has_capacity())
            .map(|w| w.worker_id.clone())
            .collect();
        if candidate_ids.is_empty() {
            return None;
        }
        let candidates: Vec<&Worker> = candidate_ids
            .iter()
            .map(|id| inner.workers.get(id).expect("just collected"))
            .collect();
        let cursor = inner.round_robin.entry(task.agent_type.clone()).or_default();
        balancing::select(self.config.load_balancing, &candidates, task.priority, cursor)
            .map(|w| w.worker_id.clone())
    }

    /// Runs `task` to completion on `worker_id` via the injected runtime,
    /// records the outcome, updates worker metrics/failure handling, and
    /// attempts to drain one more queued task of the same type.
    fn spawn_execution(self: &Arc<Self>, worker_id: WorkerId, task: Task) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = task.task_id.clone();
            let agent_type = task.agent_type.clone();
            let started = std::time::Instant::now();
            let outcome = pool.runtime.execute(task).await;
            let elapsed_s = started.elapsed().as_secs_f64();

            let mut inner = pool.inner.lock().await;
            let (status, outcome) = match outcome {
                Ok(outcome) => (
                    if outcome.success { TaskStatus::Completed } else { TaskStatus::Failed },
                    outcome,
                ),
                Err(err) => (
                    TaskStatus::Failed,
                    TaskOutcome {
                        success: false,
                        output: serde_json::Value::Null,
                        error: Some(err.to_string()),
                        artifacts: vec![],
                        execution_time_s: elapsed_s,
                    },
                ),
            };

            if let Some(worker) = inner.workers.get_mut(&worker_id) {
                worker.current_tasks.remove(&task_id);
                worker.metrics.record(outcome.success, outcome.execution_time_s);
                if !outcome.success {
                    worker.failure_count += 1;
                } else {
                    worker.failure_count = 0;
                }
                if worker.current_tasks.is_empty() && worker.status == WorkerStatus::Busy {
                    worker.status = WorkerStatus::Idle;
                }
                let breached = worker.failure_count >= pool.config.failure_threshold;
                if breached {
                    warn!(worker_id = %worker_id, failure_count = worker.failure_count, "failure threshold reached, recovering worker");
                }
                if breached {
                    pool.clone().spawn_recovery(worker_id.clone());
                }
            }

            inner.statuses.insert(task_id.clone(), status);
            inner.outcomes.insert(task_id, outcome);
            drop(inner);
            pool.notify.notify_waiters();
            pool.drain_queue_for(&agent_type).await;
        });
    }

    /// After a worker frees up, try to assign it the next queued task of
    /// its type, if any.
    async fn drain_queue_for(self: &Arc<Self>, agent_type: &str) {
        let mut inner = self.inner.lock().await;
        let idx = inner.queue.iter().position(|t| t.agent_type == agent_type);
        let Some(idx) = idx else { return };
        let task = &inner.queue[idx];
        let Some(worker_id) = self.pick_worker_locked(&mut inner, task) else { return };
        let task = inner.queue.remove(idx).expect("index from position");
        let worker = inner.workers.get_mut(&worker_id).expect("picked from table");
        worker.current_tasks.insert(task.task_id.clone());
        worker.status = WorkerStatus::Busy;
        inner.statuses.insert(task.task_id.clone(), TaskStatus::InProgress);
        drop(inner);
        self.spawn_execution(worker_id, task);
    }

    /// `WP::Result` (spec.md §4.2). Blocks until terminal status or timeout.
    pub async fn result(&self, task_id: &TaskId, timeout: std::time::Duration) -> TaskResult {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let inner = self.inner.lock().await;
                match inner.statuses.get(task_id) {
                    None => return TaskResult::NotFound,
                    Some(TaskStatus::Completed) | Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled) => {
                        if let Some(outcome) = inner.outcomes.get(task_id) {
                            return TaskResult::Done(outcome.clone());
                        }
                        return TaskResult::Done(TaskOutcome {
                            success: false,
                            output: serde_json::Value::Null,
                            error: Some("cancelled before completion".to_string()),
                            artifacts: vec![],
                            execution_time_s: 0.0,
                        });
                    }
                    Some(_) => {}
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return TaskResult::Timeout;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    /// `WP::Cancel` (spec.md §4.2).
    pub async fn cancel(&self, task_id: &TaskId) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(idx) = inner.queue.iter().position(|t| &t.task_id == task_id) {
            inner.queue.remove(idx);
            inner.statuses.insert(task_id.clone(), TaskStatus::Cancelled);
            return true;
        }
        match inner.statuses.get(task_id) {
            Some(TaskStatus::InProgress) => {
                inner.statuses.insert(task_id.clone(), TaskStatus::Cancelled);
                for worker in inner.workers.values_mut() {
                    worker.current_tasks.remove(task_id);
                }
                true
            }
            Some(TaskStatus::Pending) => {
                inner.statuses.insert(task_id.clone(), TaskStatus::Cancelled);
                true
            }
            _ => false,
        }
    }

    /// `WP::Scale` (spec.md §4.2), clamped to `[min_per_type, max_per_type]`.
    pub async fn scale(&self, agent_type: &str, target: Option<usize>) -> WorkerPoolResult<ScaleReport> {
        let started = std::time::Instant::now();
        let bounds = self.config.bounds_for(agent_type);
        let mut inner = self.inner.lock().await;
        let current: Vec<WorkerId> = inner
            .workers
            .values()
            .filter(|w| w.agent_type == agent_type)
            .map(|w| w.worker_id.clone())
            .collect();
        let current_count = current.len();

        let target = match target {
            Some(t) => t,
            None => self.auto_scale_target(&inner, agent_type, current_count, &bounds),
        };
        let target = target.clamp(bounds.min, bounds.max);

        let mut added = 0usize;
        let mut removed = 0usize;
        if target > current_count {
            for _ in current_count..target {
                let worker = Worker::new(agent_type.to_string(), 3);
                inner.workers.insert(worker.worker_id.clone(), worker);
                added += 1;
            }
        } else if target < current_count {
            let mut idle: Vec<&Worker> = current
                .iter()
                .filter_map(|id| inner.workers.get(id))
                .filter(|w| w.status == WorkerStatus::Idle)
                .collect();
            idle.sort_by_key(|w| w.metrics.last_task_at.unwrap_or(w.created_at));
            let to_remove: Vec<WorkerId> = idle
                .into_iter()
                .take(current_count - target)
                .map(|w| w.worker_id.clone())
                .collect();
            for id in to_remove {
                inner.workers.remove(&id);
                removed += 1;
            }
        }

        info!(agent_type, added, removed, target, "worker pool scaled");
        Ok(ScaleReport { added, removed, duration_s: started.elapsed().as_secs_f64() })
    }

    fn auto_scale_target(&self, inner: &Inner, agent_type: &str, current_count: usize, bounds: &super::config::TypeBounds) -> usize {
        let workers: Vec<&Worker> = inner.workers.values().filter(|w| w.agent_type == agent_type).collect();
        let used: usize = workers.iter().map(|w| w.current_tasks.len()).sum();
        let capacity: usize = workers.iter().map(|w| w.max_concurrent_tasks).sum();
        let utilization = if capacity == 0 { 1.0 } else { used as f64 / capacity as f64 };
        let queued_of_type = inner.queue.iter().filter(|t| t.agent_type == agent_type).count();

        if utilization > self.config.burst_threshold {
            return (current_count + 1).min(bounds.max);
        }
        if utilization > self.config.scale_up_threshold || queued_of_type >= 2 {
            return (current_count + 1).min(bounds.max);
        }
        if utilization < self.config.scale_down_threshold && queued_of_type == 0 {
            return current_count.saturating_sub(1).max(bounds.min);
        }
        current_count
    }

    /// `WP::Status` (spec.md §4.2).
    pub async fn status(&self) -> PoolStatus {
        let inner = self.inner.lock().await;
        let mut per_type: HashMap<String, TypeStatus> = HashMap::new();
        for worker in inner.workers.values() {
            let entry = per_type.entry(worker.agent_type.clone()).or_default();
            entry.total += 1;
            match worker.status {
                WorkerStatus::Idle => entry.idle += 1,
                WorkerStatus::Busy => entry.busy += 1,
                WorkerStatus::Failed => entry.failed += 1,
                _ => {}
            }
            entry.avg_load += worker.load_factor();
            entry.success_rate += worker.metrics.success_rate();
        }
        for stats in per_type.values_mut() {
            if stats.total > 0 {
                stats.avg_load /= stats.total as f64;
                stats.success_rate /= stats.total as f64;
            }
        }
        let total_used: usize = inner.workers.values().map(|w| w.current_tasks.len()).sum();
        let total_capacity: usize = inner.workers.values().map(|w| w.max_concurrent_tasks).sum();
        let utilization = if total_capacity == 0 { 0.0 } else { total_used as f64 / total_capacity as f64 };
        PoolStatus { per_type, queue_depth: inner.queue.len(), utilization }
    }

    async fn health_check_pass(&self) {
        let stuck: Vec<WorkerId> = {
            let inner = self.inner.lock().await;
            inner
                .workers
                .values()
                .filter(|w| {
                    w.status == WorkerStatus::Busy
                        && w.metrics
                            .last_task_at
                            .map(|t| Utc::now().signed_duration_since(t).num_seconds() as u64 >= self.config.agent_timeout.as_secs())
                            .unwrap_or(false)
                })
                .map(|w| w.worker_id.clone())
                .collect()
        };
        for worker_id in stuck {
            warn!(worker_id = %worker_id, "worker appears stuck, recovering");
            self.recover_worker(&worker_id).await;
        }

        let warned: Vec<WorkerId> = {
            let inner = self.inner.lock().await;
            inner
                .workers
                .values()
                .filter(|w| w.metrics.error_rate() > 0.5)
                .map(|w| w.worker_id.clone())
                .collect()
        };
        for worker_id in warned {
            warn!(worker_id = %worker_id, "worker error rate above 50%, not removing");
        }
    }

    fn spawn_recovery(self: Arc<Self>, worker_id: WorkerId) {
        tokio::spawn(async move {
            self.recover_worker(&worker_id).await;
        });
    }

    /// Recovery: mark `FAILED`, wait `recovery_delay`, clear `failure_count`,
    /// set `IDLE` (spec.md §4.2).
    async fn recover_worker(&self, worker_id: &WorkerId) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(worker) = inner.workers.get_mut(worker_id) {
                worker.status = WorkerStatus::Failed;
                worker.recovery_attempts += 1;
            }
        }
        tokio::time::sleep(self.config.recovery_delay).await;
        let mut inner = self.inner.lock().await;
        if let Some(worker) = inner.workers.get_mut(worker_id) {
            worker.failure_count = 0;
            worker.current_tasks.clear();
            worker.status = WorkerStatus::Idle;
            info!(worker_id = %worker_id, "worker recovered");
        }
    }

    /// Graceful shutdown: mark every worker `STOPPING`, wait up to
    /// `shutdown_grace_period` for in-flight tasks to drain, then drop
    /// everything (spec.md §4.2, §5).
    pub async fn shutdown(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.running = false;
            for worker in inner.workers.values_mut() {
                worker.status = WorkerStatus::Stopping;
            }
        }
        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace_period;
        loop {
            let still_busy = {
                let inner = self.inner.lock().await;
                inner.workers.values().any(|w| !w.current_tasks.is_empty())
            };
            if !still_busy || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        let mut inner = self.inner.lock().await;
        inner.workers.clear();
        inner.queue.clear();
        info!("worker pool shut down");
    }

    /// Ensures at least one worker of `agent_type` exists, creating one
    /// (bounded by the type maximum) if none is available. Used by the
    /// coordinator's auto-scaling-on-admission path (spec.md §4.4).
    pub async fn ensure_worker(&self, agent_type: &str) -> WorkerPoolResult<bool> {
        let has_any = {
            let inner = self.inner.lock().await;
            inner.workers.values().any(|w| w.agent_type == agent_type)
        };
        if has_any {
            return Ok(false);
        }
        let bounds = self.config.bounds_for(agent_type);
        if bounds.max == 0 {
            return Err(WorkerPoolError::AboveMaximum { agent_type: agent_type.to_string(), max: 0 });
        }
        let mut inner = self.inner.lock().await;
        let worker = Worker::new(agent_type.to_string(), 3);
        inner.workers.insert(worker.worker_id.clone(), worker);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::AgentRuntime;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoRuntime {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgentRuntime for EchoRuntime {
        fn capabilities(&self, _agent_type: &str) -> Vec<String> {
            vec!["code".to_string()]
        }

        async fn execute(&self, _task: Task) -> anyhow::Result<TaskOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TaskOutcome {
                success: true,
                output: serde_json::json!({"ok": true}),
                error: None,
                artifacts: vec![],
                execution_time_s: 0.01,
            })
        }
    }

    async fn pool_with_worker() -> Arc<WorkerPool<EchoRuntime>> {
        let pool = WorkerPool::new(Arc::new(EchoRuntime { calls: AtomicUsize::new(0) }), WorkerPoolConfig::default());
        pool.scale("coder", Some(1)).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn submit_and_await_result() {
        let pool = pool_with_worker().await;
        let task_id = pool
            .submit("coder", "code", serde_json::Value::Null, Priority::new(5), None, 0)
            .await;
        let result = pool.result(&task_id, std::time::Duration::from_secs(1)).await;
        assert!(matches!(result, TaskResult::Done(ref o) if o.success));
    }

    #[tokio::test]
    async fn result_reports_not_found_for_unknown_task() {
        let pool = pool_with_worker().await;
        let bogus = TaskId::from_string("task-bogus");
        let result = pool.result(&bogus, std::time::Duration::from_millis(50)).await;
        assert!(matches!(result, TaskResult::NotFound));
    }

    #[tokio::test]
    async fn cancel_removes_queued_task() {
        let pool = WorkerPool::new(Arc::new(EchoRuntime { calls: AtomicUsize::new(0) }), WorkerPoolConfig::default());
        // No workers registered, so the task stays queued.
        let task_id = pool
            .submit("coder", "code", serde_json::Value::Null, Priority::new(5), None, 0)
            .await;
        assert!(pool.cancel(&task_id).await);
    }

    #[tokio::test]
    async fn scale_clamps_to_configured_maximum() {
        let mut config = WorkerPoolConfig::default();
        config.per_type.insert("coder".to_string(), super::super::config::TypeBounds { min: 0, max: 2 });
        let pool = WorkerPool::new(Arc::new(EchoRuntime { calls: AtomicUsize::new(0) }), config);
        let report = pool.scale("coder", Some(10)).await.unwrap();
        assert_eq!(report.added, 2);
    }
}
