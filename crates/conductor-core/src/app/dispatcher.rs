//! Dispatcher - キューから取り出したタスクを最適な idle worker に渡す
//!
//! # 選択ルール（貪欲・成績優先）
//! 1. idle かつ capability が一致（または "general"）する worker が候補
//! 2. success_rate が高い順、次に tasks_completed が多い順、最後に番号の小さい順
//! 3. 候補がいなければ末尾に再キューして `dispatch_backoff` だけ待つ
//!
//! 低成績の worker が飢える可能性はあるが、公平性は目標にしていない。

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::shared::Shared;
use crate::domain::{TaskId, TaskType, Worker, WorkerId};
use crate::ports::Clock;

/// Pick the best idle worker able to run `task_type`.
pub fn select_worker<'a>(workers: &'a [Worker], task_type: &TaskType) -> Option<&'a Worker> {
    workers
        .iter()
        .filter(|w| w.is_idle() && w.can_handle(task_type))
        .max_by(|a, b| rank(a, b))
}

fn rank(a: &Worker, b: &Worker) -> Ordering {
    a.performance
        .success_rate
        .total_cmp(&b.performance.success_rate)
        .then(a.performance.tasks_completed.cmp(&b.performance.tasks_completed))
        // 番号が小さい方を「大きい」とみなす
        .then(b.id.cmp(&a.id))
}

/// Single-slot inbox senders, one per worker, in worker order.
pub(crate) struct Inboxes {
    senders: Vec<(WorkerId, mpsc::Sender<TaskId>)>,
}

impl Inboxes {
    pub fn new(senders: Vec<(WorkerId, mpsc::Sender<TaskId>)>) -> Self {
        Self { senders }
    }

    fn get(&self, worker_id: WorkerId) -> Option<&mpsc::Sender<TaskId>> {
        self.senders
            .iter()
            .find(|(id, _)| *id == worker_id)
            .map(|(_, tx)| tx)
    }
}

pub(crate) async fn dispatcher_loop(
    shared: Arc<Shared>,
    inboxes: Inboxes,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let poll = shared.config.poll_interval();
    let backoff = shared.config.dispatch_backoff();
    info!("dispatcher started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = shared.queue.pop(poll) => next,
        };
        let Some(task_id) = next else {
            continue;
        };

        if dispatch_one(&shared, &inboxes, task_id).await {
            continue;
        }

        // 誰も受けられない: 末尾に戻して少し待つ
        if let Err(e) = shared.queue.requeue(task_id).await {
            warn!(task_id = %task_id, error = %e, "requeue after failed dispatch was rejected");
        }
        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    info!("dispatcher stopped");
}

/// Try to hand `task_id` to a worker. `false` means it must go back to the queue.
async fn dispatch_one(shared: &Shared, inboxes: &Inboxes, task_id: TaskId) -> bool {
    let worker_id = {
        let mut registry = shared.registry.write().await;
        let Some(task_type) = registry.pending_type(task_id) else {
            // 登録されていないか既に終端: キューから落とす
            debug!(task_id = %task_id, "dropping stale queue entry");
            return true;
        };
        let Some(worker_id) = select_worker(registry.workers(), &task_type).map(|w| w.id) else {
            debug!(task_id = %task_id, task_type = %task_type, "no eligible idle worker");
            return false;
        };
        let now = shared.clock.now();
        if !registry.assign(task_id, worker_id, now) {
            return false;
        }
        worker_id
    };

    let delivered = inboxes
        .get(worker_id)
        .is_some_and(|tx| tx.try_send(task_id).is_ok());
    if !delivered {
        warn!(task_id = %task_id, worker_id = %worker_id, "worker inbox unavailable, rolling back");
        shared.registry.write().await.unassign(task_id, worker_id);
        return false;
    }

    debug!(task_id = %task_id, worker_id = %worker_id, "task assigned");
    true
}
