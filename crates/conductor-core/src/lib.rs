//! conductor-core
//!
//! Task Supervisor: タスク記述をサブタスクに分解し、固定サイズの worker プールで
//! 実行する。リトライ回数は有界、状態は常に参照可能。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, worker, state, decision, outcome, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, Decomposer）
//! - **impls**: 実装（KeywordDecomposer, TaskQueue）
//! - **typed**: 型付き Task API（TaskKind, Handler, HandlerRegistry）
//! - **app**: アプリケーションロジック（builder, supervisor, dispatcher, worker_loop, status）
//! - **config**: SupervisorConfig と検証
//!
//! # 使用例
//! ```ignore
//! let supervisor = SupervisorBuilder::new()
//!     .handler::<GeneralTask, _>(MyHandler)?
//!     .build()?;
//! supervisor.start().await?;
//!
//! let tasks = supervisor.decompose_task("review this code", &Map::new())?;
//! supervisor.submit_tasks(tasks).await?;
//! println!("{:?}", supervisor.system_status().await);
//!
//! supervisor.stop().await;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{BuildError, Supervisor, SupervisorBuilder, SystemStatus, WorkerStatusReport};
pub use config::{ConfigError, SupervisorConfig};
pub use domain::{
    HandlerError, SupervisorError, Task, TaskId, TaskResult, TaskSpec, TaskStatus, TaskType,
    WorkerId,
};
