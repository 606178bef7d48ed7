//! TaskQueue - 有界の FIFO キュー（TaskId のみを保持）
//!
//! # 設計
//! - `Mutex<VecDeque<TaskId>>` + `Notify` 2 本（要素あり / 空きあり）
//! - 外部からの投入（`push`）は容量を守り、満杯なら timeout まで待つ
//! - 内部の再キュー（`requeue`: リトライ、適格 worker なし）は容量を無視する。
//!   実行中タスク数ぶんだけ一時的に容量を超えうるが、タスクは失われない
//! - `close` 後の push は `QueueClosed`、pop は残りを吐き出したあと `None`
//!
//! Task 本体は registry が持つ。ここには ID だけが流れる。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{SupervisorError, TaskId};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<TaskId>,
    closed: bool,
}

#[derive(Debug)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    /// push / requeue 時の通知（pop 待ちを起こす）
    item_ready: Notify,
    /// pop 時の通知（満杯で待っている push を起こす）
    space_ready: Notify,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `task_id`, waiting up to `timeout` for space.
    pub async fn push(&self, task_id: TaskId, timeout: Duration) -> Result<(), SupervisorError> {
        let deadline = Instant::now() + timeout;
        loop {
            // 状態確認の前に待機を登録しておく（取りこぼし防止）
            let notified = self.space_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(SupervisorError::QueueClosed);
                }
                if state.items.len() < self.capacity {
                    state.items.push_back(task_id);
                    drop(state);
                    self.item_ready.notify_one();
                    return Ok(());
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(SupervisorError::QueueFull { timeout });
            }
        }
    }

    /// Append to the back regardless of capacity. Fails only once closed.
    pub async fn requeue(&self, task_id: TaskId) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SupervisorError::QueueClosed);
        }
        state.items.push_back(task_id);
        drop(state);
        self.item_ready.notify_one();
        Ok(())
    }

    /// Take the oldest id, waiting up to `timeout`.
    ///
    /// `None` on timeout, or when the queue is closed and drained.
    pub async fn pop(&self, timeout: Duration) -> Option<TaskId> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.item_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(task_id) = state.items.pop_front() {
                    drop(state);
                    self.space_ready.notify_one();
                    return Some(task_id);
                }
                if state.closed {
                    return None;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Reject further pushes and wake every waiter. Queued ids stay poppable.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.item_ready.notify_waiters();
        self.space_ready.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ulid::Ulid;

    fn id() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[tokio::test]
    async fn test_push_pop_fifo() {
        let queue = TaskQueue::new(10);
        let (a, b, c) = (id(), id(), id());
        for t in [a, b, c] {
            queue.push(t, Duration::from_millis(10)).await.unwrap();
        }
        assert_eq!(queue.len().await, 3);

        let short = Duration::from_millis(10);
        assert_eq!(queue.pop(short).await, Some(a));
        assert_eq!(queue.pop(short).await, Some(b));
        assert_eq!(queue.pop(short).await, Some(c));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_pop_timeout() {
        let queue = TaskQueue::new(1);
        let start = Instant::now();
        let popped = queue.pop(Duration::from_millis(200)).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn test_push_times_out_when_full() {
        let queue = TaskQueue::new(1);
        queue.push(id(), Duration::from_millis(10)).await.unwrap();

        let start = Instant::now();
        let err = queue.push(id(), Duration::from_millis(300)).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, SupervisorError::QueueFull { .. }));
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_pop_frees_space_for_waiting_push() {
        let queue = Arc::new(TaskQueue::new(1));
        let first = id();
        let second = id();
        queue.push(first, Duration::from_millis(10)).await.unwrap();

        let pusher = tokio::spawn({
            let queue = queue.clone();
            async move { queue.push(second, Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(first));

        pusher.await.unwrap().unwrap();
        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(second));
    }

    #[tokio::test]
    async fn test_push_wakes_pop() {
        let queue = Arc::new(TaskQueue::new(4));
        let task_id = id();

        let popper = tokio::spawn({
            let queue = queue.clone();
            async move { queue.pop(Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.push(task_id, Duration::from_millis(10)).await.unwrap();

        assert_eq!(popper.await.unwrap(), Some(task_id));
    }

    #[tokio::test]
    async fn test_requeue_ignores_capacity() {
        let queue = TaskQueue::new(1);
        queue.push(id(), Duration::from_millis(10)).await.unwrap();
        queue.requeue(id()).await.unwrap();
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.capacity(), 1);
    }

    #[tokio::test]
    async fn test_close_rejects_push_and_drains() {
        let queue = TaskQueue::new(4);
        let left = id();
        queue.push(left, Duration::from_millis(10)).await.unwrap();
        queue.close().await;

        assert!(queue.is_closed().await);
        assert!(matches!(
            queue.push(id(), Duration::from_millis(10)).await,
            Err(SupervisorError::QueueClosed)
        ));
        assert!(matches!(queue.requeue(id()).await, Err(SupervisorError::QueueClosed)));

        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(left));
        let start = Instant::now();
        assert_eq!(queue.pop(Duration::from_secs(5)).await, None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_push() {
        let queue = Arc::new(TaskQueue::new(1));
        queue.push(id(), Duration::from_millis(10)).await.unwrap();

        let pusher = tokio::spawn({
            let queue = queue.clone();
            async move { queue.push(id(), Duration::from_secs(5)).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.close().await;

        let res = tokio::time::timeout(Duration::from_secs(1), pusher)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(res, Err(SupervisorError::QueueClosed)));
    }
}
