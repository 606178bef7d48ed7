//! Registry - タスク表とワーカープール（1 つの RwLock の中身）
//!
//! # 不変条件
//! - タスクは削除しない（投入失敗のロールバックを除く）
//! - Running のタスクはちょうど 1 人の worker の `current_task` にいる
//! - 状態遷移はすべてここを通り、`TaskStatus::can_transition_to` で検査する
//!
//! ロックは呼び出し側（app 層）が取る。このファイルは同期コードのみ。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::domain::{
    Decision, SupervisorError, Task, TaskId, TaskStatus, TaskType, Worker, WorkerId,
};

#[derive(Debug, Default)]
pub struct Registry {
    tasks: HashMap<TaskId, Task>,
    workers: Vec<Worker>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the worker pool. Called once by `start()`.
    pub fn install_workers(&mut self, workers: Vec<Worker>) {
        self.workers = workers;
    }

    pub fn insert(&mut self, mut task: Task) -> Result<(), SupervisorError> {
        if self.tasks.contains_key(&task.id) {
            return Err(SupervisorError::DuplicateTask(task.id));
        }
        task.status = TaskStatus::Pending;
        task.assigned_to = None;
        self.tasks.insert(task.id, task);
        Ok(())
    }

    /// Undo `insert` for a submission that never reached the queue.
    pub fn remove(&mut self, task_id: TaskId) -> Option<Task> {
        self.tasks.remove(&task_id)
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    fn worker_mut(&mut self, worker_id: WorkerId) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|w| w.id == worker_id)
    }

    /// Type of a task that is waiting for dispatch.
    pub fn pending_type(&self, task_id: TaskId) -> Option<TaskType> {
        self.tasks
            .get(&task_id)
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.task_type.clone())
    }

    /// Pending -> Running on `worker_id`; the worker goes Busy in the same step.
    ///
    /// Returns false (and changes nothing) if either side is not ready.
    pub fn assign(&mut self, task_id: TaskId, worker_id: WorkerId, now: DateTime<Utc>) -> bool {
        let task_ready = self
            .tasks
            .get(&task_id)
            .is_some_and(|t| t.status.can_transition_to(TaskStatus::Running));
        let worker_ready = self
            .workers
            .iter()
            .any(|w| w.id == worker_id && w.is_idle());
        if !task_ready || !worker_ready {
            return false;
        }

        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.start_attempt(worker_id, now);
        }
        if let Some(worker) = self.worker_mut(worker_id) {
            worker.assign(task_id);
        }
        true
    }

    /// Roll back `assign` when the hand-off to the worker failed.
    pub fn unassign(&mut self, task_id: TaskId, worker_id: WorkerId) {
        if let Some(task) = self.tasks.get_mut(&task_id)
            && task.status == TaskStatus::Running
        {
            task.release();
        }
        if let Some(worker) = self.worker_mut(worker_id)
            && worker.current_task == Some(task_id)
        {
            worker.release();
        }
    }

    pub fn heartbeat(&mut self, worker_id: WorkerId, now: DateTime<Utc>) {
        if let Some(worker) = self.worker_mut(worker_id) {
            worker.last_heartbeat = now;
        }
    }

    /// Running -> Completed. Worker perf and status are updated in the same step.
    pub fn complete(
        &mut self,
        task_id: TaskId,
        worker_id: WorkerId,
        result: Value,
        elapsed: Duration,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let task = self.tasks.get_mut(&task_id)?;
        if !task.status.can_transition_to(TaskStatus::Completed) {
            return None;
        }
        task.mark_completed(result, now);
        let snapshot = task.clone();

        if let Some(worker) = self.worker_mut(worker_id) {
            worker.performance.record(true, elapsed);
            worker.release();
        }
        Some(snapshot)
    }

    /// Running -> Pending (retry) or Running -> Failed.
    pub fn fail(
        &mut self,
        task_id: TaskId,
        worker_id: WorkerId,
        error: String,
        elapsed: Duration,
        now: DateTime<Utc>,
    ) -> Option<(Decision, Task)> {
        let task = self.tasks.get_mut(&task_id)?;
        if task.status != TaskStatus::Running {
            return None;
        }
        let decision = task.record_failure(error, now);
        let snapshot = task.clone();

        if let Some(worker) = self.worker_mut(worker_id) {
            worker.performance.record(false, elapsed);
            worker.release();
        }
        Some((decision, snapshot))
    }

    /// Free a worker whose inbox delivered an id it cannot run.
    pub fn release_worker(&mut self, worker_id: WorkerId) {
        if let Some(worker) = self.worker_mut(worker_id) {
            worker.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskSpec, WorkerStatus};
    use serde_json::json;
    use ulid::Ulid;

    fn task(max_retries: u32) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskSpec::new("general", json!({})).with_max_retries(max_retries),
            Utc::now(),
        )
    }

    fn registry_with_worker() -> Registry {
        let mut registry = Registry::new();
        registry.install_workers(vec![Worker::new(
            WorkerId::new(1),
            [TaskType::general()],
            Utc::now(),
        )]);
        registry
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut registry = Registry::new();
        let t = task(0);
        registry.insert(t.clone()).unwrap();
        assert!(matches!(
            registry.insert(t.clone()),
            Err(SupervisorError::DuplicateTask(id)) if id == t.id
        ));
    }

    #[test]
    fn insert_resets_status() {
        let mut registry = Registry::new();
        let mut t = task(0);
        t.status = TaskStatus::Failed;
        registry.insert(t.clone()).unwrap();
        assert_eq!(registry.task(t.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn assign_moves_both_sides() {
        let mut registry = registry_with_worker();
        let t = task(0);
        registry.insert(t.clone()).unwrap();

        assert!(registry.assign(t.id, WorkerId::new(1), Utc::now()));
        let stored = registry.task(t.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
        assert_eq!(stored.assigned_to, Some(WorkerId::new(1)));
        let worker = &registry.workers()[0];
        assert_eq!(worker.status, WorkerStatus::Busy);
        assert_eq!(worker.current_task, Some(t.id));

        // busy worker cannot take a second task
        let other = task(0);
        registry.insert(other.clone()).unwrap();
        assert!(!registry.assign(other.id, WorkerId::new(1), Utc::now()));
        assert_eq!(registry.task(other.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn unassign_restores_pending_and_idle() {
        let mut registry = registry_with_worker();
        let t = task(0);
        registry.insert(t.clone()).unwrap();
        registry.assign(t.id, WorkerId::new(1), Utc::now());

        registry.unassign(t.id, WorkerId::new(1));
        assert_eq!(registry.task(t.id).unwrap().status, TaskStatus::Pending);
        assert_eq!(registry.task(t.id).unwrap().retry_count, 0);
        assert!(registry.workers()[0].is_idle());
    }

    #[test]
    fn complete_updates_worker_performance() {
        let mut registry = registry_with_worker();
        let t = task(0);
        registry.insert(t.clone()).unwrap();
        registry.assign(t.id, WorkerId::new(1), Utc::now());

        let done = registry
            .complete(t.id, WorkerId::new(1), json!("ok"), Duration::from_millis(5), Utc::now())
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let worker = &registry.workers()[0];
        assert!(worker.is_idle());
        assert_eq!(worker.performance.tasks_completed, 1);
        assert_eq!(worker.performance.success_rate, 1.0);

        // absorbing
        assert!(
            registry
                .complete(t.id, WorkerId::new(1), json!("again"), Duration::ZERO, Utc::now())
                .is_none()
        );
    }

    #[test]
    fn fail_requeues_then_marks_failed() {
        let mut registry = registry_with_worker();
        let t = task(1);
        registry.insert(t.clone()).unwrap();
        let w = WorkerId::new(1);

        registry.assign(t.id, w, Utc::now());
        let (decision, snapshot) = registry
            .fail(t.id, w, "e1".into(), Duration::ZERO, Utc::now())
            .unwrap();
        assert_eq!(decision, Decision::Requeue { retry: 1 });
        assert_eq!(snapshot.status, TaskStatus::Pending);

        registry.assign(t.id, w, Utc::now());
        let (decision, snapshot) = registry
            .fail(t.id, w, "e2".into(), Duration::ZERO, Utc::now())
            .unwrap();
        assert_eq!(decision, Decision::MarkFailed);
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(registry.workers()[0].performance.tasks_failed, 2);

        // a failed task is never dispatched again
        assert!(registry.pending_type(t.id).is_none());
        assert!(!registry.assign(t.id, w, Utc::now()));
    }
}
