//! Handler trait - Task を実行する Handler の定義
//!
//! Supervisor が埋め込み側アプリケーションから受け取る唯一の契約。
//! 典型的には LLM の completion API を呼ぶが、Supervisor はその中身を知らない。
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler<T: TaskKind>` - ペイロードを型で受け取る
//! - **内部（Dyn）**: `DynHandler` - object-safe, `Task` をそのまま受け取る
//!
//! # 契約
//! - 異なる Task に対して並行に呼ばれる（同じ Task を同時に 2 回呼ぶことはない）
//! - 1 回の呼び出しの中ではリトライしない。リトライはタスク単位（再キュー）なので
//!   `max_retries > 0` のタスクでは再実行に耐えること
//! - 外部呼び出しの失敗は `HandlerError` に変換して返す

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use tokio::sync::watch;

use super::task::TaskKind;
use crate::domain::{HandlerError, Task, TaskId, WorkerId};

/// Execution context passed to every handler call.
///
/// Carries the supervisor's shutdown signal so long external calls can bail out.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    worker_id: WorkerId,
    task_id: TaskId,
    attempt: u32,
    shutdown: Option<watch::Receiver<bool>>,
}

impl HandlerContext {
    pub fn new(
        worker_id: WorkerId,
        task_id: TaskId,
        attempt: u32,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id,
            task_id,
            attempt,
            shutdown: Some(shutdown),
        }
    }

    /// Context that is never cancelled (handler unit tests, ad-hoc calls).
    pub fn detached(worker_id: WorkerId, task_id: TaskId, attempt: u32) -> Self {
        Self {
            worker_id,
            task_id,
            attempt,
            shutdown: None,
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the supervisor is stopping. Never resolves when detached.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.shutdown.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Handler は型付きペイロードを受け取り、結果の JSON を返す
///
/// # 使用例
/// ```ignore
/// struct Analyst;
///
/// #[async_trait]
/// impl Handler<AnalysisTask> for Analyst {
///     async fn handle(&self, ctx: &HandlerContext, task: AnalysisTask) -> Result<Value, HandlerError> {
///         Ok(json!({ "analysis_result": task.description }))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskKind>: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, input: T) -> Result<Value, HandlerError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// `HashMap<TaskType, Arc<dyn DynHandler>>` に格納するための型消去層。
/// 生の `Task` を扱いたい場合は直接実装してもよい。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, task: &Task) -> Result<Value, HandlerError>;
}

/// `Handler<T>` → `DynHandler` の型消去
pub struct TypedHandler<T: TaskKind, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskKind, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskKind, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle(&self, ctx: &HandlerContext, task: &Task) -> Result<Value, HandlerError> {
        let input: T = serde_json::from_value(task.data.clone()).map_err(|e| {
            HandlerError::InvalidPayload {
                task_type: task.task_type.clone(),
                message: e.to_string(),
            }
        })?;
        self.handler.handle(ctx, input).await
    }
}

/// Closure-backed handler: `Fn(HandlerContext, Task) -> Future<Output = Result<Value, HandlerError>>`.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a `DynHandler`.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(HandlerContext, Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> DynHandler for FnHandler<F>
where
    F: Fn(HandlerContext, Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn handle(&self, ctx: &HandlerContext, task: &Task) -> Result<Value, HandlerError> {
        (self.f)(ctx.clone(), task.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskSpec;
    use crate::typed::task::AnalysisTask;
    use chrono::Utc;
    use serde_json::json;
    use ulid::Ulid;

    struct EchoAnalysis;

    #[async_trait]
    impl Handler<AnalysisTask> for EchoAnalysis {
        async fn handle(
            &self,
            _ctx: &HandlerContext,
            input: AnalysisTask,
        ) -> Result<Value, HandlerError> {
            Ok(json!({ "analysis_result": input.description }))
        }
    }

    fn task(task_type: &str, data: Value) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskSpec::new(task_type, data),
            Utc::now(),
        )
    }

    fn ctx(task: &Task) -> HandlerContext {
        HandlerContext::detached(WorkerId::new(1), task.id, 1)
    }

    #[tokio::test]
    async fn typed_handler_decodes_payload() {
        let handler = TypedHandler::<AnalysisTask, _>::new(EchoAnalysis);
        let t = task("analysis", json!({ "description": "look", "context": {} }));

        let out = handler.handle(&ctx(&t), &t).await.unwrap();
        assert_eq!(out["analysis_result"], "look");
    }

    #[tokio::test]
    async fn typed_handler_rejects_bad_payload() {
        let handler = TypedHandler::<AnalysisTask, _>::new(EchoAnalysis);
        let t = task("analysis", json!({ "description": 42 }));

        let err = handler.handle(&ctx(&t), &t).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn fn_handler_sees_context() {
        let handler = handler_fn(|ctx: HandlerContext, task: Task| async move {
            Ok::<Value, HandlerError>(json!({ "worker": ctx.worker_id().to_string(), "type": task.task_type.as_str() }))
        });
        let t = task("general", json!({}));

        let out = handler.handle(&ctx(&t), &t).await.unwrap();
        assert_eq!(out["worker"], "worker-1");
        assert_eq!(out["type"], "general");
    }

    #[tokio::test]
    async fn context_observes_shutdown() {
        let (tx, rx) = watch::channel(false);
        let ctx = HandlerContext::new(WorkerId::new(1), TaskId::from_ulid(Ulid::new()), 1, rx);
        assert!(!ctx.is_cancelled());

        tx.send(true).unwrap();
        assert!(ctx.is_cancelled());
        tokio::time::timeout(std::time::Duration::from_millis(100), ctx.cancelled())
            .await
            .expect("cancelled() should resolve after shutdown");
    }
}
