//! WorkerLoop - 1 worker = 1 ルーチン。受け取ったタスクを 1 つずつ実行する
//!
//! # 1 サイクル
//! 1. heartbeat を更新
//! 2. 自分の inbox を `poll_interval` だけ待つ（shutdown と競合させる）
//! 3. 受け取ったら handler を実行（panic は catch してエラー扱い）。
//!    実行中も `poll_interval` ごとに heartbeat を更新する
//! 4. 結果を registry に反映: 成功 / 再キュー / 失敗確定
//! 5. 終端なら result processor に通知
//!
//! handler 実行中はどのロックも持たない（heartbeat の書き込みは tick の間だけ）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::result_processor::publish;
use super::shared::Shared;
use crate::domain::{Decision, HandlerError, Outcome, Task, TaskId, TaskResult, WorkerId};
use crate::ports::Clock;
use crate::typed::HandlerContext;

pub(crate) async fn worker_loop(
    worker_id: WorkerId,
    shared: Arc<Shared>,
    mut inbox: mpsc::Receiver<TaskId>,
    results_tx: mpsc::Sender<TaskResult>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let poll = shared.config.poll_interval();
    info!(worker_id = %worker_id, "worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let now = shared.clock.now();
        shared.registry.write().await.heartbeat(worker_id, now);

        let received = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = tokio::time::timeout(poll, inbox.recv()) => received,
        };

        match received {
            // poll timeout: heartbeat を打ち直す
            Err(_) => continue,
            // dispatcher がいなくなった
            Ok(None) => break,
            Ok(Some(task_id)) => {
                run_task(worker_id, &shared, task_id, &results_tx, &shutdown_rx).await;
            }
        }
    }

    info!(worker_id = %worker_id, "worker stopped");
}

async fn run_task(
    worker_id: WorkerId,
    shared: &Shared,
    task_id: TaskId,
    results_tx: &mpsc::Sender<TaskResult>,
    shutdown_rx: &watch::Receiver<bool>,
) {
    let task = {
        let registry = shared.registry.read().await;
        registry
            .task(task_id)
            .filter(|t| t.assigned_to == Some(worker_id))
            .cloned()
    };
    let Some(task) = task else {
        warn!(task_id = %task_id, worker_id = %worker_id, "received a task not assigned to this worker");
        shared.registry.write().await.release_worker(worker_id);
        return;
    };

    let attempt = task.attempts();
    debug!(
        task_id = %task_id,
        worker_id = %worker_id,
        task_type = %task.task_type,
        attempt,
        "executing task"
    );

    let ctx = HandlerContext::new(worker_id, task_id, attempt, shutdown_rx.clone());
    let started = Instant::now();
    let outcome = execute_with_heartbeat(worker_id, shared, &ctx, &task).await;
    let elapsed = started.elapsed();
    let now = shared.clock.now();

    match outcome {
        Ok(value) => {
            let done = shared
                .registry
                .write()
                .await
                .complete(task_id, worker_id, value.clone(), elapsed, now);
            if let Some(done) = done {
                publish(
                    results_tx,
                    &shared.results,
                    TaskResult {
                        task_id,
                        worker_id,
                        outcome: Outcome::Success(value),
                        attempts: done.attempts(),
                        duration: elapsed,
                        completed_at: now,
                    },
                );
            }
        }
        Err(err) => {
            let message = err.to_string();
            let failed = shared
                .registry
                .write()
                .await
                .fail(task_id, worker_id, message.clone(), elapsed, now);
            let Some((decision, snapshot)) = failed else {
                return;
            };

            match decision {
                Decision::Requeue { retry } => {
                    debug!(
                        task_id = %task_id,
                        retry,
                        max_retries = snapshot.max_retries,
                        error = %message,
                        "attempt failed, re-queueing"
                    );
                    if let Err(e) = shared.queue.requeue(task_id).await {
                        warn!(task_id = %task_id, error = %e, "retry could not be re-queued");
                    }
                }
                Decision::MarkFailed => publish(
                    results_tx,
                    &shared.results,
                    TaskResult {
                        task_id,
                        worker_id,
                        outcome: Outcome::Failure(message),
                        attempts: snapshot.attempts(),
                        duration: elapsed,
                        completed_at: now,
                    },
                ),
            }
        }
    }
}

/// Run the handler while refreshing this worker's heartbeat every `poll_interval`.
async fn execute_with_heartbeat(
    worker_id: WorkerId,
    shared: &Shared,
    ctx: &HandlerContext,
    task: &Task,
) -> Result<Value, HandlerError> {
    let run = execute(shared, ctx, task);
    tokio::pin!(run);

    let mut beat = tokio::time::interval(shared.config.poll_interval());
    beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 最初の tick は即時。直前に loop 側で打っているので読み捨てる
    beat.tick().await;

    loop {
        tokio::select! {
            outcome = &mut run => return outcome,
            _ = beat.tick() => {
                let now = shared.clock.now();
                shared.registry.write().await.heartbeat(worker_id, now);
            }
        }
    }
}

/// Resolve and run the handler; a panic inside it becomes `HandlerError::Panicked`.
async fn execute(shared: &Shared, ctx: &HandlerContext, task: &Task) -> Result<Value, HandlerError> {
    let handler = shared.handlers.resolve(&task.task_type)?;

    match AssertUnwindSafe(handler.handle(ctx, task)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                task_id = %task.id,
                worker_id = %ctx.worker_id(),
                panic = %message,
                "handler panicked"
            );
            Err(HandlerError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
