//! Worker: one concurrent execution slot with capabilities and a performance history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::ids::{TaskId, WorkerId};
use super::state::WorkerStatus;
use super::task::TaskType;

/// Smoothing factor for the moving average of attempt durations.
const AVG_TIME_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerPerformance {
    pub tasks_completed: u64,
    pub tasks_failed: u64,

    /// completed / (completed + failed), 0.0 before the first finished task.
    pub success_rate: f64,

    /// Exponential moving average of attempt durations.
    #[serde(with = "super::duration_ms")]
    pub avg_task_time: Duration,
}

impl WorkerPerformance {
    /// Record one finished attempt. `finished()` grows by exactly one.
    pub fn record(&mut self, success: bool, elapsed: Duration) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        let total = self.finished();
        self.success_rate = self.tasks_completed as f64 / total as f64;

        self.avg_task_time = if total == 1 {
            elapsed
        } else {
            self.avg_task_time.mul_f64(1.0 - AVG_TIME_ALPHA) + elapsed.mul_f64(AVG_TIME_ALPHA)
        };
    }

    pub fn finished(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub capabilities: BTreeSet<TaskType>,
    pub current_task: Option<TaskId>,
    pub performance: WorkerPerformance,
    pub last_heartbeat: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        capabilities: impl IntoIterator<Item = TaskType>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            capabilities: capabilities.into_iter().collect(),
            current_task: None,
            performance: WorkerPerformance::default(),
            last_heartbeat: now,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    /// Capability match: the exact type, or the "general" wildcard.
    pub fn can_handle(&self, task_type: &TaskType) -> bool {
        self.capabilities.contains(task_type)
            || self.capabilities.iter().any(TaskType::is_general)
    }

    pub(crate) fn assign(&mut self, task: TaskId) {
        self.status = WorkerStatus::Busy;
        self.current_task = Some(task);
    }

    pub(crate) fn release(&mut self) {
        self.status = WorkerStatus::Idle;
        self.current_task = None;
    }
}
