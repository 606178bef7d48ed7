//! Status - 読み取り専用のスナップショット
//!
//! すべて registry の read lock の下で一度に数える。返した後は古くなりうる。

use serde::{Deserialize, Serialize};

use super::registry::Registry;
use crate::domain::{TaskStatus, Worker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub(crate) fn collect(registry: &Registry) -> Self {
        let mut counts = TaskCounts::default();
        for task in registry.tasks() {
            counts.total += 1;
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
}

impl WorkerCounts {
    pub(crate) fn collect(workers: &[Worker]) -> Self {
        let idle = workers.iter().filter(|w| w.is_idle()).count();
        WorkerCounts {
            total: workers.len(),
            idle,
            busy: workers.len() - idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatusReport {
    pub counts: WorkerCounts,
    pub workers: Vec<Worker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub running: bool,
    pub tasks: TaskCounts,
    pub workers: WorkerCounts,

    /// Ids waiting in the shared queue (includes re-queued retries).
    pub queue_depth: usize,
    pub queue_capacity: usize,

    pub results_processed: u64,
    pub results_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, TaskSpec, TaskType, WorkerId};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn counts_follow_registry() {
        let mut registry = Registry::new();
        registry.install_workers(vec![
            Worker::new(WorkerId::new(1), [TaskType::general()], Utc::now()),
            Worker::new(WorkerId::new(2), [TaskType::general()], Utc::now()),
        ]);
        let running = Task::new(
            TaskId::from_ulid(ulid::Ulid::new()),
            TaskSpec::new("general", json!({})),
            Utc::now(),
        );
        let waiting = Task::new(
            TaskId::from_ulid(ulid::Ulid::new()),
            TaskSpec::new("general", json!({})),
            Utc::now(),
        );
        registry.insert(running.clone()).unwrap();
        registry.insert(waiting).unwrap();
        registry.assign(running.id, WorkerId::new(2), Utc::now());

        let tasks = TaskCounts::collect(&registry);
        assert_eq!(
            tasks,
            TaskCounts {
                total: 2,
                pending: 1,
                running: 1,
                completed: 0,
                failed: 0
            }
        );

        let workers = WorkerCounts::collect(registry.workers());
        assert_eq!(
            workers,
            WorkerCounts {
                total: 2,
                idle: 1,
                busy: 1
            }
        );
    }
}
