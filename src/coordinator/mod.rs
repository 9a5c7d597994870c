//! Parallel Coordinator component (spec.md §4.4): admits cycles under the
//! parallelism cap, orders the queue by priority, waits for dependencies,
//! acquires resource locks, and drives cycles through the PSM.

mod config;
mod coordinator;
mod error;
mod locks;
mod queue;

pub use config::{CoordinatorConfig, ExecutionMode};
pub use coordinator::{Coordinator, CoordinatorStatus};
pub use error::{CoordinatorError, CoordinatorResult};
