//! SupervisorBuilder - Supervisor の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン（所有権を受け渡すメソッドチェーン）
//! - 起動時検証（Fail-fast）: 設定値の検証と、期待する handler の登録漏れ検出

use std::collections::BTreeSet;
use std::sync::Arc;

use super::supervisor::Supervisor;
use crate::config::{ConfigError, SupervisorConfig};
use crate::domain::TaskType;
use crate::impls::KeywordDecomposer;
use crate::ports::{Clock, Decomposer, IdGenerator, SystemClock, UlidGenerator};
use crate::typed::{DynHandler, Handler, HandlerRegistry, RegistryError, TaskKind};

/// # 使用例
/// ```ignore
/// let supervisor = SupervisorBuilder::new()
///     .config(config)
///     .handler::<AnalysisTask, _>(Analyst)?
///     .handler::<GeneralTask, _>(Fallback)?
///     .expect_handlers(&["analysis", "general"])
///     .build()?;
/// ```
///
/// `worker()` を一度でも呼ぶと、config の `max_workers` / `worker_capabilities`
/// ではなく明示したプールを使う。
pub struct SupervisorBuilder {
    config: SupervisorConfig,
    workers: Vec<BTreeSet<TaskType>>,
    handlers: HandlerRegistry,
    expected_handlers: Option<Vec<TaskType>>,
    decomposer: Option<Arc<dyn Decomposer>>,
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing handlers: {0:?}. These task types were expected but not registered.")]
    MissingHandlers(Vec<TaskType>),

    #[error("Worker {index} has no capabilities")]
    EmptyWorkerCapabilities { index: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig::default(),
            workers: Vec::new(),
            handlers: HandlerRegistry::new(),
            expected_handlers: None,
            decomposer: None,
            clock: None,
            id_generator: None,
        }
    }

    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add one worker with explicit capabilities.
    pub fn worker<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskType>,
    {
        self.workers
            .push(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Add `count` workers sharing the same capabilities.
    pub fn workers<T>(mut self, count: usize, capabilities: &[T]) -> Self
    where
        T: Clone + Into<TaskType>,
    {
        for _ in 0..count {
            self.workers
                .push(capabilities.iter().cloned().map(Into::into).collect());
        }
        self
    }

    pub fn handler<T: TaskKind, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.handlers.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn handler_dyn(
        mut self,
        task_type: impl Into<TaskType>,
        handler: Arc<dyn DynHandler>,
    ) -> Result<Self, RegistryError> {
        self.handlers.register_dyn(task_type, handler)?;
        Ok(self)
    }

    /// `build()` fails unless every listed type has its own handler.
    pub fn expect_handlers(mut self, task_types: &[&str]) -> Self {
        self.expected_handlers = Some(task_types.iter().map(|t| TaskType::new(*t)).collect());
        self
    }

    pub fn decomposer(mut self, decomposer: impl Decomposer + 'static) -> Self {
        self.decomposer = Some(Arc::new(decomposer));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(id_generator));
        self
    }

    pub fn build(self) -> Result<Supervisor, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_handlers {
            let registered = self.handlers.registered_types();
            let missing: Vec<TaskType> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }

        let workers = if self.workers.is_empty() {
            let caps: BTreeSet<TaskType> = self.config.worker_capabilities.iter().cloned().collect();
            vec![caps; self.config.max_workers]
        } else {
            self.workers
        };
        if let Some(index) = workers.iter().position(BTreeSet::is_empty) {
            return Err(BuildError::EmptyWorkerCapabilities { index });
        }

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let decomposer = self
            .decomposer
            .unwrap_or_else(|| Arc::new(KeywordDecomposer::new()));

        Ok(Supervisor::new(
            self.config,
            workers,
            self.handlers,
            decomposer,
            clock,
            id_generator,
        ))
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
