//! Worker (pooled agent) state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ids::{TaskId, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerStatus {
    Idle,
    Busy,
    Failed,
    Starting,
    Stopping,
    Retired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub total_tasks: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_task_at: Option<DateTime<Utc>>,
    pub moving_avg_execution_s: f64,
}

impl WorkerMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.failures as f64 / self.total_tasks as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        1.0 - self.error_rate()
    }

    /// EWMA update: new_avg = 0.9*old_avg + 0.1*sample.
    pub fn record(&mut self, success: bool, execution_s: f64) {
        self.total_tasks += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.last_task_at = Some(Utc::now());
        self.moving_avg_execution_s = 0.9 * self.moving_avg_execution_s + 0.1 * execution_s;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub agent_type: String,
    pub status: WorkerStatus,
    pub current_tasks: HashSet<TaskId>,
    pub max_concurrent_tasks: usize,
    pub capabilities: Vec<String>,
    pub metrics: WorkerMetrics,
    pub failure_count: u32,
    pub recovery_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(agent_type: impl Into<String>, max_concurrent_tasks: usize) -> Self {
        Self {
            worker_id: WorkerId::new(),
            agent_type: agent_type.into(),
            status: WorkerStatus::Idle,
            current_tasks: HashSet::new(),
            max_concurrent_tasks,
            capabilities: Vec::new(),
            metrics: WorkerMetrics::default(),
            failure_count: 0,
            recovery_attempts: 0,
            created_at: Utc::now(),
        }
    }

    pub fn load_factor(&self) -> f64 {
        if self.max_concurrent_tasks == 0 {
            1.0
        } else {
            self.current_tasks.len() as f64 / self.max_concurrent_tasks as f64
        }
    }

    pub fn minutes_since_last_task(&self) -> f64 {
        match self.metrics.last_task_at {
            Some(t) => Utc::now().signed_duration_since(t).num_seconds() as f64 / 60.0,
            None => f64::MAX / 2.0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Idle || self.status == WorkerStatus::Busy
    }

    pub fn has_capacity(&self) -> bool {
        self.is_available() && self.current_tasks.len() < self.max_concurrent_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_worker_is_idle() {
        let w = Worker::new("coder", 3);
        assert_eq!(w.status, WorkerStatus::Idle);
        assert_eq!(w.load_factor(), 0.0);
    }
}
