//! Engine Facade (spec.md §4.5): wires PSM/WP/CR/PC, owns their lifecycle,
//! and exposes the single API callers depend on.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::{Context, ContextProvider, ContextRequest};
use crate::conflict_resolver::{ConflictResolver, ResolutionStats};
use crate::coordinator::{Coordinator, CoordinatorStatus};
use crate::events::{CoreEvent, EventSink, NullEventSink};
use crate::model::{Cycle, CycleId};
use crate::psm::Psm;
use crate::runtime::AgentRuntime;
use crate::worker_pool::{PoolStatus, WorkerPool};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};

/// Forwards to a shared `Arc<dyn EventSink>` — `Psm::new` wants an owned
/// `Box<dyn EventSink>`, but the engine wires one sink to every component.
struct SharedSink(Arc<dyn EventSink>);

impl EventSink for SharedSink {
    fn publish(&self, event: CoreEvent) {
        self.0.publish(event);
    }
}

/// A cycle to submit as part of `ExecuteParallelCycles`.
#[derive(Debug, Clone)]
pub struct CycleSpec {
    pub story_id: String,
    pub priority: u8,
    pub dependencies: Vec<CycleId>,
    pub estimated_duration_s: Option<f64>,
    pub anticipated_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub cycle_ids: Vec<CycleId>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_s: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationReport {
    pub actions_applied: Vec<String>,
    pub estimated_gain: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineMetrics {
    pub total_cycles_executed: u64,
    pub peak_parallel_cycles: usize,
    pub throughput_cycles_per_hour: f64,
    pub average_cycle_time_s: f64,
    pub conflicts_detected: usize,
    pub conflicts_resolved: u64,
    pub auto_resolutions: u64,
    pub human_escalations: u64,
    pub context_cache_hit_rate: f64,
}

impl EngineMetrics {
    fn record_cycle_time(&mut self, elapsed_s: f64) {
        const ALPHA: f64 = 0.1;
        if self.total_cycles_executed == 0 {
            self.average_cycle_time_s = elapsed_s;
        } else {
            self.average_cycle_time_s = ALPHA * elapsed_s + (1.0 - ALPHA) * self.average_cycle_time_s;
        }
        if elapsed_s > 0.0 {
            let hourly = 3600.0 / elapsed_s;
            self.throughput_cycles_per_hour = if self.total_cycles_executed == 0 {
                hourly
            } else {
                0.1 * hourly + 0.9 * self.throughput_cycles_per_hour
            };
        }
    }

    fn record_cache_hit(&mut self, hit: bool) {
        let sample = if hit { 1.0 } else { 0.0 };
        self.context_cache_hit_rate = 0.1 * sample + 0.9 * self.context_cache_hit_rate;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub coordinator: CoordinatorStatusView,
    pub worker_pool: PoolStatus,
    pub resolution_stats: ResolutionStats,
    pub metrics: EngineMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatusView {
    pub active: usize,
    pub pending: usize,
    pub blocked: usize,
    pub paused: usize,
    pub queue_depth: usize,
    pub utilization: f64,
    pub peak_parallel_cycles: usize,
    pub locks_held: usize,
}

impl From<CoordinatorStatus> for CoordinatorStatusView {
    fn from(s: CoordinatorStatus) -> Self {
        Self {
            active: s.active,
            pending: s.pending,
            blocked: s.blocked,
            paused: s.paused,
            queue_depth: s.queue_depth,
            utilization: s.utilization,
            peak_parallel_cycles: s.peak_parallel_cycles,
            locks_held: s.locks_held,
        }
    }
}

pub struct Engine<R: AgentRuntime + 'static> {
    config: EngineConfig,
    psm: Arc<Psm>,
    conflict_resolver: Arc<ConflictResolver>,
    worker_pool: Arc<WorkerPool<R>>,
    coordinator: Arc<Coordinator<R>>,
    context_provider: Option<Arc<dyn ContextProvider>>,
    metrics: Mutex<EngineMetrics>,
    running: Mutex<bool>,
    optimize_task: Mutex<Option<JoinHandle<()>>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: AgentRuntime + 'static> Engine<R> {
    pub fn new(
        config: EngineConfig,
        runtime: Arc<R>,
        context_provider: Option<Arc<dyn ContextProvider>>,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Arc<Self> {
        let sink: Arc<dyn EventSink> = sink.unwrap_or_else(|| Arc::new(NullEventSink));
        let psm = Arc::new(Psm::new(Box::new(SharedSink(Arc::clone(&sink)))));
        let conflict_resolver = Arc::new(ConflictResolver::new(config.conflict_resolver.clone(), Arc::clone(&sink)));
        let worker_pool = WorkerPool::new(runtime, config.worker_pool.clone());
        let coordinator = Coordinator::new(
            config.coordinator.clone(),
            Arc::clone(&psm),
            Arc::clone(&conflict_resolver),
            Arc::clone(&worker_pool),
            context_provider.clone(),
            Arc::clone(&sink),
        );

        Arc::new(Self {
            config,
            psm,
            conflict_resolver,
            worker_pool,
            coordinator,
            context_provider,
            metrics: Mutex::new(EngineMetrics::default()),
            running: Mutex::new(false),
            optimize_task: Mutex::new(None),
            health_task: Mutex::new(None),
        })
    }

    /// `Start` (spec.md §4.5): starts every component's background loop plus
    /// the engine's own optimization loop (every 5 minutes).
    pub async fn start(self: &Arc<Self>) {
        *self.running.lock().await = true;
        self.worker_pool.start().await;
        self.coordinator.start().await;
        self.conflict_resolver.start_proactive_loop();

        let engine = Arc::clone(self);
        let health_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.health_check_interval);
            loop {
                ticker.tick().await;
                if !*engine.running.lock().await {
                    break;
                }
                let status = engine.worker_pool.status().await;
                if status.utilization > 0.95 {
                    warn!(utilization = status.utilization, "worker pool near saturation");
                }
            }
        });
        *self.health_task.lock().await = Some(health_handle);

        let engine = Arc::clone(self);
        let optimize_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5 * 60));
            loop {
                ticker.tick().await;
                if !*engine.running.lock().await {
                    break;
                }
                let report = engine.optimize_performance().await;
                info!(actions = report.actions_applied.len(), "background optimization pass");
            }
        });
        *self.optimize_task.lock().await = Some(optimize_handle);

        info!("engine started");
    }

    /// `Stop` (spec.md §5): cancels background loops, gives in-flight tasks
    /// a grace period, then tears down the worker pool.
    pub async fn stop(&self) {
        *self.running.lock().await = false;
        if let Some(handle) = self.health_task.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.optimize_task.lock().await.take() {
            handle.abort();
        }
        self.coordinator.stop().await;
        self.worker_pool.shutdown().await;
        info!("engine stopped");
    }

    pub async fn pause(&self, cycle_id: &CycleId) -> EngineResult<()> {
        Ok(self.coordinator.pause(cycle_id).await?)
    }

    pub async fn resume(&self, cycle_id: &CycleId) -> EngineResult<()> {
        Ok(self.coordinator.resume(cycle_id).await?)
    }

    pub async fn cancel(&self, cycle_id: &CycleId) -> EngineResult<()> {
        Ok(self.coordinator.cancel(cycle_id).await?)
    }

    /// `Submit` (spec.md §6).
    pub async fn submit(self: &Arc<Self>, spec: CycleSpec) -> CycleId {
        self.coordinator
            .submit(
                spec.story_id,
                spec.priority,
                spec.dependencies.into_iter().collect(),
                spec.estimated_duration_s,
                spec.anticipated_paths,
            )
            .await
    }

    /// `ExecuteParallelCycles` (spec.md §4.5): submits every cycle, then
    /// polls each one's status until it reaches a terminal `CycleStatus` or
    /// `resource_timeout` elapses — phase advancement past admission is
    /// driven by external `IssueCommand` calls, not by the engine itself, so
    /// a cycle nobody ever drives further stays non-terminal and is counted
    /// as `failed` once the deadline passes.
    pub async fn execute_parallel_cycles(self: &Arc<Self>, cycles: Vec<CycleSpec>) -> ExecutionReport {
        let start = tokio::time::Instant::now();
        let mut ids = Vec::with_capacity(cycles.len());
        for spec in cycles {
            ids.push(self.submit(spec).await);
        }

        let deadline = self.config.coordinator.resource_timeout;
        let poll_interval = self.config.coordinator.coordination_check_interval;
        let ids_ref = &ids;
        let _ = tokio::time::timeout(deadline, async {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                self.coordinator.tick().await;
                let mut all_terminal = true;
                for id in ids_ref {
                    match self.coordinator.cycle_status(id).await {
                        Some(cycle) if cycle.status.is_terminal() => {}
                        _ => {
                            all_terminal = false;
                            break;
                        }
                    }
                }
                if all_terminal {
                    break;
                }
                ticker.tick().await;
            }
        })
        .await;

        let mut succeeded = 0;
        let mut failed = 0;
        for id in &ids {
            match self.coordinator.cycle_status(id).await {
                Some(cycle) if cycle.status == crate::model::CycleStatus::Completed => succeeded += 1,
                _ => failed += 1,
            }
        }

        let elapsed_s = start.elapsed().as_secs_f64();
        {
            let mut metrics = self.metrics.lock().await;
            metrics.total_cycles_executed += ids.len() as u64;
            metrics.record_cycle_time(elapsed_s);
            let status = self.coordinator.status().await;
            metrics.peak_parallel_cycles = metrics.peak_parallel_cycles.max(status.peak_parallel_cycles);
            let stats = self.conflict_resolver.resolution_stats();
            metrics.conflicts_detected = self.conflict_resolver.conflicts_detected();
            metrics.conflicts_resolved = stats.total() - stats.failed;
            metrics.auto_resolutions = stats.auto_resolved;
            metrics.human_escalations = stats.escalated;
        }

        ExecutionReport {
            cycle_ids: ids,
            succeeded,
            failed,
            elapsed_s,
        }
    }

    pub async fn cycle_status(&self, cycle_id: &CycleId) -> EngineResult<Cycle> {
        self.coordinator
            .cycle_status(cycle_id)
            .await
            .ok_or_else(|| EngineError::CycleNotFound(cycle_id.clone()))
    }

    /// `GetEngineStatus` (spec.md §4.5): composes the coordinator, worker
    /// pool, conflict-resolution, and engine-level metrics views.
    pub async fn engine_status(&self) -> EngineStatus {
        EngineStatus {
            coordinator: self.coordinator.status().await.into(),
            worker_pool: self.worker_pool.status().await,
            resolution_stats: self.conflict_resolver.resolution_stats(),
            metrics: self.metrics.lock().await.clone(),
        }
    }

    pub async fn resource_status(&self) -> HashMap<crate::model::ResourceId, CycleId> {
        self.coordinator.resource_status().await
    }

    pub fn parallel_status(&self) -> HashMap<CycleId, crate::model::Phase> {
        self.psm.parallel_status()
    }

    /// `OptimizePerformance` (spec.md §4.5, SPEC_FULL §4.10): reorders the
    /// scheduling queue; estimated gain is a rough heuristic based on how
    /// much the queue's average dependency depth dropped.
    pub async fn optimize_performance(&self) -> OptimizationReport {
        self.coordinator.optimize_queue().await;
        OptimizationReport {
            actions_applied: vec!["reordered scheduling queue by dependency count and priority".to_string()],
            estimated_gain: 0.0,
        }
    }

    /// `HandleContextRequest` (spec.md §4.5, §6).
    pub async fn handle_context_request(
        &self,
        agent_type: impl Into<String>,
        story_id: impl Into<String>,
        task: impl Into<String>,
        max_tokens: u32,
        isolated: bool,
    ) -> EngineResult<Context> {
        let provider = self
            .context_provider
            .as_ref()
            .ok_or_else(|| EngineError::Other(anyhow::anyhow!("no context provider configured")))?;
        let context = provider
            .prepare_context(ContextRequest {
                agent_type: agent_type.into(),
                story_id: story_id.into(),
                task: task.into(),
                max_tokens,
                isolated: isolated && self.config.enable_context_isolation,
            })
            .await
            .map_err(EngineError::Other)?;
        self.metrics.lock().await.record_cache_hit(context.cache_hit);
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::model::{Task, TaskOutcome};
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

    fn engine() -> Arc<Engine<NoopRuntime>> {
        Engine::new(EngineConfig::default(), Arc::new(NoopRuntime), None, Some(Arc::new(NullEventSink)))
    }

    #[tokio::test]
    async fn submit_then_tick_admits_cycle() {
        let engine = engine();
        let cycle_id = engine
            .submit(CycleSpec {
                story_id: "s1".to_string(),
                priority: 5,
                dependencies: vec![],
                estimated_duration_s: None,
                anticipated_paths: vec![],
            })
            .await;
        engine.coordinator.tick().await;
        let status = engine.cycle_status(&cycle_id).await.unwrap();
        assert_eq!(status.status, crate::model::CycleStatus::Active);
    }

    // No command ever drives the cycle past DESIGN, so it never reaches a
    // terminal status — `ExecuteParallelCycles` must still return once
    // `resource_timeout` elapses rather than polling forever.
    #[tokio::test(start_paused = true)]
    async fn execute_parallel_cycles_returns_after_timeout_if_never_driven() {
        let mut config = EngineConfig::default();
        config.coordinator.resource_timeout = std::time::Duration::from_secs(1);
        config.coordinator.coordination_check_interval = std::time::Duration::from_millis(100);
        let engine = Engine::new(config, Arc::new(NoopRuntime), None, Some(Arc::new(NullEventSink)));

        let report = engine
            .execute_parallel_cycles(vec![CycleSpec {
                story_id: "s1".to_string(),
                priority: 5,
                dependencies: vec![],
                estimated_duration_s: None,
                anticipated_paths: vec![],
            }])
            .await;
        assert_eq!(report.cycle_ids.len(), 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn handle_context_request_without_provider_errors() {
        let engine = engine();
        let err = engine.handle_context_request("design", "s1", "design", 1024, true).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn engine_status_composes_subcomponents() {
        let engine = engine();
        let status = engine.engine_status().await;
        assert_eq!(status.coordinator.active, 0);
    }
}
