//! App - アプリケーション層
//!
//! ports と domain を組み合わせて Supervisor を動かす。
//!
//! # 主要コンポーネント
//! - **SupervisorBuilder**: 構築とワイヤリング、起動時検証
//! - **Supervisor**: 公開 API とルーチンのライフサイクル
//! - **Registry**: タスク表 + ワーカープール（1 つの RwLock）
//! - **Dispatcher**: キュー → 最適な idle worker
//! - **WorkerLoop**: handler 実行、リトライ判定
//! - **ResultProcessor**: 終端結果の記録
//! - **Status**: 状態スナップショット

pub mod builder;
pub mod dispatcher;
mod registry;
mod result_processor;
mod shared;
pub mod status;
pub mod supervisor;
mod worker_loop;

pub use self::builder::{BuildError, SupervisorBuilder};
pub use self::dispatcher::select_worker;
pub use self::status::{SystemStatus, TaskCounts, WorkerCounts, WorkerStatusReport};
pub use self::supervisor::Supervisor;
