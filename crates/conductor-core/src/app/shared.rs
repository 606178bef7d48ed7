//! Shared - Supervisor と各ルーチンが共有する状態
//!
//! Supervisor が 1 つだけ作り、`Arc` で worker / dispatcher / result processor に渡す。

use std::sync::Arc;

use tokio::sync::RwLock;

use super::registry::Registry;
use super::result_processor::ResultLog;
use crate::config::SupervisorConfig;
use crate::impls::TaskQueue;
use crate::ports::Clock;
use crate::typed::HandlerRegistry;

pub(crate) struct Shared {
    pub registry: RwLock<Registry>,
    pub queue: TaskQueue,
    pub handlers: HandlerRegistry,
    pub clock: Arc<dyn Clock>,
    pub config: SupervisorConfig,
    pub results: ResultLog,
}

impl Shared {
    pub fn new(config: SupervisorConfig, handlers: HandlerRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            queue: TaskQueue::new(config.queue_capacity),
            handlers,
            clock,
            config,
            results: ResultLog::default(),
        }
    }
}
