//! Supervisor - 公開 API（ファサード）
//!
//! 分解・投入・状態参照の入口と、ルーチン群（worker × N, dispatcher,
//! result processor）のライフサイクルを持つ。グローバル状態は持たない。
//!
//! # ライフサイクル
//! `NotStarted` → `start()` → `Running` → `stop()` → `Stopped`
//! - 2 回目の `start()` は `AlreadyStarted`（停止後も再開しない）
//! - `stop()` は何度呼んでもよい。起動前なら何もしない

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::{Inboxes, dispatcher_loop};
use super::result_processor::result_processor_loop;
use super::shared::Shared;
use super::status::{SystemStatus, TaskCounts, WorkerCounts, WorkerStatusReport};
use super::worker_loop::worker_loop;
use crate::config::SupervisorConfig;
use crate::domain::{
    DecomposeError, SupervisorError, Task, TaskId, TaskResult, TaskSpec, TaskType, Worker,
    WorkerId,
};
use crate::ports::{Clock, Decomposer, IdGenerator};
use crate::typed::HandlerRegistry;

enum Lifecycle {
    NotStarted,
    Running(Routines),
    Stopped,
}

/// Handles of the spawned routines, owned by the supervisor while running.
struct Routines {
    shutdown_tx: watch::Sender<bool>,
    /// worker loops + dispatcher
    loops: Vec<JoinHandle<()>>,
    result_processor: JoinHandle<()>,
}

pub struct Supervisor {
    shared: Arc<Shared>,
    worker_capabilities: Vec<BTreeSet<TaskType>>,
    decomposer: Arc<dyn Decomposer>,
    id_generator: Arc<dyn IdGenerator>,
    lifecycle: Mutex<Lifecycle>,
    /// Mirrors `Lifecycle::Running`; readable without waiting on `stop()`.
    running: AtomicBool,
}

impl Supervisor {
    pub(crate) fn new(
        config: SupervisorConfig,
        worker_capabilities: Vec<BTreeSet<TaskType>>,
        handlers: HandlerRegistry,
        decomposer: Arc<dyn Decomposer>,
        clock: Arc<dyn Clock>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, handlers, clock)),
            worker_capabilities,
            decomposer,
            id_generator,
            lifecycle: Mutex::new(Lifecycle::NotStarted),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    /// Create the worker pool and spawn every routine. Returns immediately.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::NotStarted) {
            return Err(SupervisorError::AlreadyStarted);
        }

        let now = self.shared.clock.now();
        let workers: Vec<Worker> = self
            .worker_capabilities
            .iter()
            .enumerate()
            .map(|(i, caps)| Worker::new(WorkerId::new(i as u32 + 1), caps.iter().cloned(), now))
            .collect();
        let worker_ids: Vec<WorkerId> = workers.iter().map(|w| w.id).collect();
        self.shared.registry.write().await.install_workers(workers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (results_tx, results_rx) = mpsc::channel(self.shared.config.result_capacity);

        let mut loops = Vec::with_capacity(worker_ids.len() + 1);
        let mut senders = Vec::with_capacity(worker_ids.len());
        for worker_id in worker_ids {
            let (inbox_tx, inbox_rx) = mpsc::channel(1);
            senders.push((worker_id, inbox_tx));
            loops.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.shared),
                inbox_rx,
                results_tx.clone(),
                shutdown_rx.clone(),
            )));
        }
        // worker だけが送信側を持つ。全 worker 終了でチャネルが閉じる
        drop(results_tx);

        loops.push(tokio::spawn(dispatcher_loop(
            Arc::clone(&self.shared),
            Inboxes::new(senders),
            shutdown_rx,
        )));

        let shared = Arc::clone(&self.shared);
        let result_processor =
            tokio::spawn(async move { result_processor_loop(&shared.results, results_rx).await });

        info!(
            workers = self.worker_capabilities.len(),
            queue_capacity = self.shared.queue.capacity(),
            "supervisor started"
        );
        *lifecycle = Lifecycle::Running(Routines {
            shutdown_tx,
            loops,
            result_processor,
        });
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    /// Signal shutdown, wait up to `shutdown_grace`, abort stragglers, close the queue.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let routines = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(routines) => routines,
            other => {
                *lifecycle = other;
                return;
            }
        };

        self.running.store(false, Ordering::Release);
        info!("supervisor stopping");
        let grace = self.shared.config.shutdown_grace();
        let _ = routines.shutdown_tx.send(true);

        let aborts: Vec<_> = routines.loops.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(grace, join_all(routines.loops)).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "routines did not stop in time, aborting");
            for handle in &aborts {
                handle.abort();
            }
        }

        self.shared.queue.close().await;

        // 送信側（worker）が全部落ちれば自然に終わる
        let processor_abort = routines.result_processor.abort_handle();
        if tokio::time::timeout(grace, routines.result_processor).await.is_err() {
            processor_abort.abort();
        }

        info!("supervisor stopped");
    }

    /// `false` as soon as `stop()` begins.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Give `spec` a fresh id and creation time.
    pub fn new_task(&self, spec: TaskSpec) -> Task {
        Task::new(
            self.id_generator.generate_task_id(),
            spec,
            self.shared.clock.now(),
        )
    }

    /// Split a description into ready-to-submit tasks (not yet registered).
    pub fn decompose_task(
        &self,
        description: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<Task>, SupervisorError> {
        let specs = self.decomposer.decompose(description, context)?;
        if specs.is_empty() {
            return Err(DecomposeError::Empty.into());
        }
        let tasks: Vec<Task> = specs.into_iter().map(|spec| self.new_task(spec)).collect();
        debug!(count = tasks.len(), "decomposed task description");
        Ok(tasks)
    }

    /// Register and enqueue, waiting up to `submit_timeout` for queue space.
    pub async fn submit_task(&self, task: Task) -> Result<(), SupervisorError> {
        let timeout = self.shared.config.submit_timeout();
        self.submit_task_with_timeout(task, timeout).await
    }

    pub async fn submit_task_with_timeout(
        &self,
        task: Task,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        if self.shared.queue.is_closed().await {
            return Err(SupervisorError::QueueClosed);
        }

        let task_id = task.id;
        let task_type = task.task_type.clone();
        self.shared.registry.write().await.insert(task)?;

        if let Err(e) = self.shared.queue.push(task_id, timeout).await {
            // キューに入らなかったものは受け付けていない扱い
            self.shared.registry.write().await.remove(task_id);
            warn!(task_id = %task_id, error = %e, "submission rejected");
            return Err(e);
        }

        debug!(task_id = %task_id, task_type = %task_type, "task submitted");
        Ok(())
    }

    /// Submit in order; stops at the first error. Earlier tasks stay queued.
    pub async fn submit_tasks(&self, tasks: Vec<Task>) -> Result<(), SupervisorError> {
        for task in tasks {
            self.submit_task(task).await?;
        }
        Ok(())
    }

    pub async fn task_status(&self, task_id: TaskId) -> Result<Task, SupervisorError> {
        self.shared
            .registry
            .read()
            .await
            .task(task_id)
            .cloned()
            .ok_or(SupervisorError::TaskNotFound(task_id))
    }

    /// Latest terminal result seen by the result processor, if any.
    pub async fn task_result(&self, task_id: TaskId) -> Option<TaskResult> {
        self.shared.results.get(task_id).await
    }

    pub async fn worker_status(&self) -> WorkerStatusReport {
        let registry = self.shared.registry.read().await;
        let workers = registry.workers().to_vec();
        WorkerStatusReport {
            counts: WorkerCounts::collect(&workers),
            workers,
        }
    }

    /// One snapshot: counts and queue depth are read under the same registry guard.
    pub async fn system_status(&self) -> SystemStatus {
        let registry = self.shared.registry.read().await;
        // queue のロックは registry を待たないので、この順で取っても詰まらない
        let queue_depth = self.shared.queue.len().await;
        SystemStatus {
            running: self.is_running(),
            tasks: TaskCounts::collect(&registry),
            workers: WorkerCounts::collect(registry.workers()),
            queue_depth,
            queue_capacity: self.shared.queue.capacity(),
            results_processed: self.shared.results.processed(),
            results_dropped: self.shared.results.dropped(),
        }
    }
}
