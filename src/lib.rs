//! Parallel TDD Execution Substrate
//!
//! A library crate coordinating multiple concurrent test-driven-development
//! cycles: a Phase State Machine enforces each cycle's DESIGN → TEST_RED →
//! CODE_GREEN → REFACTOR → COMMIT transitions, a Worker Pool dispatches
//! agent tasks with load-balancing and auto-scaling, a Conflict Resolver
//! detects and resolves file/dependency conflicts between cycles running in
//! parallel, and a Parallel Coordinator admits cycles under a parallelism
//! cap and drives them through the other three. The Engine Facade wires all
//! four together behind a single API.
//!
//! The crate owns no process-wide state: the event stream is delivered
//! through an injected `EventSink`, and the two external collaborators
//! (context preparation, agent execution) are consumed through the
//! `ContextProvider`/`AgentRuntime` traits a caller implements.

#![allow(dead_code)]
#![allow(clippy::uninlined_format_args)]

pub mod conflict_resolver;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod logging;
pub mod model;
pub mod psm;
pub mod runtime;
pub mod worker_pool;

pub use context::{Context, ContextProvider, ContextRequest};
pub use conflict_resolver::{ConflictError, ConflictResolver, ConflictResolverConfig, ConflictResult, ResolutionOutcome, ResolutionStats};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorResult, CoordinatorStatus, ExecutionMode};
pub use engine::{CoordinatorStatusView, CycleSpec, Engine, EngineConfig, EngineError, EngineMetrics, EngineResult, EngineStatus, ExecutionReport, OptimizationReport};
pub use events::{CoordinationEventType, CoreEvent, EventBus, EventSink, NullEventSink, SharedEventBus};
pub use logging::init_tracing;
pub use model::{
    Command, Complexity, Conflict, ConflictAnalysis, ConflictId, ConflictKind, ConflictStatus, Cycle, CycleId,
    CycleStatus, DependencyGraph, FileModification, LineRange, LockMode, ModificationKind, Phase, Priority,
    ResolutionStrategy, ResourceId, ResourceLock, ResourceType, Severity, Task, TaskId, TaskOutcome, TaskStatus,
    Worker, WorkerId, WorkerMetrics, WorkerStatus,
};
pub use psm::{Psm, PsmError, PsmResult, ResourceAction, Validation};
pub use runtime::AgentRuntime;
pub use worker_pool::{
    AgentPoolStrategy, LoadBalancingAlgorithm, PoolStatus, ScaleReport, TaskResult, TypeBounds, TypeStatus, WorkerPool,
    WorkerPoolConfig, WorkerPoolError, WorkerPoolResult,
};
