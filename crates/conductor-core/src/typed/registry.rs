//! HandlerRegistry - Handler の登録と解決
//!
//! # 設計
//! - 初期化時（builder）に登録し、実行時は不変（ロック不要）
//! - task_type ごとに 1 つ。二重登録はエラー
//! - 解決時、専用 handler が無ければ "general" handler にフォールバック

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::TaskKind;
use crate::domain::{HandlerError, TaskType};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskType),
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn DynHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a typed handler under `T::TYPE`.
    pub fn register<T: TaskKind, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(T::task_type(), Arc::new(TypedHandler::<T, H>::new(handler)))
    }

    /// Register an untyped handler that receives the raw `Task`.
    pub fn register_dyn(
        &mut self,
        task_type: impl Into<TaskType>,
        handler: Arc<dyn DynHandler>,
    ) -> Result<(), RegistryError> {
        let task_type = task_type.into();
        if self.handlers.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.handlers.insert(task_type, handler);
        Ok(())
    }

    /// Exact lookup, no fallback.
    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Lookup with the "general" fallback.
    pub fn resolve(&self, task_type: &TaskType) -> Result<Arc<dyn DynHandler>, HandlerError> {
        self.handlers
            .get(task_type)
            .or_else(|| self.handlers.get(&TaskType::general()))
            .cloned()
            .ok_or_else(|| HandlerError::NoHandler(task_type.clone()))
    }

    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, TaskSpec, WorkerId};
    use crate::typed::handler::{HandlerContext, handler_fn};
    use crate::typed::task::{AnalysisTask, GeneralTask};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Analyst;

    #[async_trait]
    impl Handler<AnalysisTask> for Analyst {
        async fn handle(&self, _: &HandlerContext, _: AnalysisTask) -> Result<Value, HandlerError> {
            Ok(json!("analysis"))
        }
    }

    struct Generalist;

    #[async_trait]
    impl Handler<GeneralTask> for Generalist {
        async fn handle(&self, _: &HandlerContext, _: GeneralTask) -> Result<Value, HandlerError> {
            Ok(json!("general"))
        }
    }

    async fn run(registry: &HandlerRegistry, task_type: &str) -> Result<Value, HandlerError> {
        let task = Task::new(
            TaskId::from_ulid(ulid::Ulid::new()),
            TaskSpec::new(task_type, json!({"description": "d"})),
            chrono::Utc::now(),
        );
        let handler = registry.resolve(&task.task_type)?;
        let ctx = HandlerContext::detached(WorkerId::new(1), task.id, 1);
        handler.handle(&ctx, &task).await
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register::<AnalysisTask, _>(Analyst).unwrap();

        assert!(registry.get(&TaskType::new("analysis")).is_some());
        assert!(registry.get(&TaskType::new("testing")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_registration() {
        let mut registry = HandlerRegistry::new();
        registry.register::<AnalysisTask, _>(Analyst).unwrap();
        let result = registry.register::<AnalysisTask, _>(Analyst);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t.as_str() == "analysis"));
    }

    #[test]
    fn test_registered_types_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register::<GeneralTask, _>(Generalist).unwrap();
        registry.register::<AnalysisTask, _>(Analyst).unwrap();
        assert_eq!(
            registry.registered_types(),
            vec![TaskType::new("analysis"), TaskType::new("general")]
        );
    }

    #[tokio::test]
    async fn resolve_prefers_exact_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register::<AnalysisTask, _>(Analyst).unwrap();
        registry.register::<GeneralTask, _>(Generalist).unwrap();

        assert_eq!(run(&registry, "analysis").await.unwrap(), json!("analysis"));
    }

    #[tokio::test]
    async fn resolve_falls_back_to_general() {
        let mut registry = HandlerRegistry::new();
        registry.register::<GeneralTask, _>(Generalist).unwrap();

        assert_eq!(run(&registry, "testing").await.unwrap(), json!("general"));
    }

    #[tokio::test]
    async fn resolve_without_fallback_is_no_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register::<AnalysisTask, _>(Analyst).unwrap();

        let err = run(&registry, "testing").await.unwrap_err();
        assert_eq!(err, HandlerError::NoHandler(TaskType::new("testing")));
    }

    #[tokio::test]
    async fn register_dyn_accepts_closures() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_dyn(
                "custom",
                Arc::new(handler_fn(|_ctx, task: Task| async move {
                    Ok::<Value, HandlerError>(json!({ "id": task.id.to_string() }))
                })),
            )
            .unwrap();

        let out = run(&registry, "custom").await.unwrap();
        assert!(out["id"].as_str().unwrap().starts_with("task-"));
    }
}
