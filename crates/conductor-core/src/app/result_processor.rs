//! ResultProcessor - 終端に達したタスクの結果を受け取って記録する
//!
//! worker からは有界チャネルへの `try_send` で届く。満杯なら送信側で捨てて
//! `results_dropped` を数える（worker を止めないことを優先）。
//! タスクの正本は registry なので、ここで失われても状態は壊れない。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::domain::{Outcome, TaskId, TaskResult};

/// Latest result per task plus delivery counters.
#[derive(Debug, Default)]
pub(crate) struct ResultLog {
    entries: RwLock<HashMap<TaskId, TaskResult>>,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl ResultLog {
    pub async fn record(&self, result: TaskResult) {
        self.entries.write().await.insert(result.task_id, result);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn get(&self, task_id: TaskId) -> Option<TaskResult> {
        self.entries.read().await.get(&task_id).cloned()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn note_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Non-blocking hand-off from a worker.
pub(crate) fn publish(tx: &mpsc::Sender<TaskResult>, log: &ResultLog, result: TaskResult) {
    let task_id = result.task_id;
    if let Err(e) = tx.try_send(result) {
        log.note_dropped();
        warn!(task_id = %task_id, error = %e, "result channel unavailable, dropping result");
    }
}

/// Drain results until every sender is gone.
pub(crate) async fn result_processor_loop(log: &ResultLog, mut rx: mpsc::Receiver<TaskResult>) {
    info!("result processor started");
    while let Some(result) = rx.recv().await {
        match &result.outcome {
            Outcome::Success(_) => info!(
                task_id = %result.task_id,
                worker_id = %result.worker_id,
                attempts = result.attempts,
                duration_ms = result.duration.as_millis() as u64,
                "task completed"
            ),
            Outcome::Failure(error) => warn!(
                task_id = %result.task_id,
                worker_id = %result.worker_id,
                attempts = result.attempts,
                error = %error,
                "task failed"
            ),
        }
        log.record(result).await;
    }
    debug!(processed = log.processed(), "result channel closed");
    info!("result processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkerId;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn result(outcome: Outcome) -> TaskResult {
        TaskResult {
            task_id: TaskId::from_ulid(ulid::Ulid::new()),
            worker_id: WorkerId::new(1),
            outcome,
            attempts: 1,
            duration: Duration::from_millis(3),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn processor_records_until_closed() {
        let log = Arc::new(ResultLog::default());
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn({
            let log = log.clone();
            async move { result_processor_loop(&log, rx).await }
        });

        let ok = result(Outcome::Success(serde_json::json!(1)));
        let bad = result(Outcome::Failure("boom".into()));
        publish(&tx, &log, ok.clone());
        publish(&tx, &log, bad.clone());
        drop(tx);

        handle.await.unwrap();
        assert_eq!(log.processed(), 2);
        assert_eq!(log.dropped(), 0);
        assert_eq!(log.get(ok.task_id).await, Some(ok));
        assert_eq!(log.get(bad.task_id).await.unwrap().outcome, Outcome::Failure("boom".into()));
    }

    #[tokio::test]
    async fn full_channel_drops_and_counts() {
        let log = ResultLog::default();
        let (tx, _rx) = mpsc::channel(1);

        publish(&tx, &log, result(Outcome::Success(serde_json::Value::Null)));
        publish(&tx, &log, result(Outcome::Success(serde_json::Value::Null)));

        assert_eq!(log.dropped(), 1);
        assert_eq!(log.processed(), 0);
    }
}
