//! Impls - ports の既定実装とインメモリのキュー
//!
//! # 含まれる実装
//! - **KeywordDecomposer**: キーワードによる既定の分解戦略
//! - **TaskQueue**: 有界 FIFO（プロセス内）
//!
//! 時刻と ID の既定実装（`SystemClock`, `UlidGenerator`）は trait と同じ
//! ports 側のファイルに置いている。

pub mod keyword_decomposer;
pub mod task_queue;

pub use self::keyword_decomposer::KeywordDecomposer;
pub use self::task_queue::TaskQueue;
