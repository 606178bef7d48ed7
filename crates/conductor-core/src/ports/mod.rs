//! Ports - 抽象化レイヤー
//!
//! Supervisor が外部に依存する点（時刻、ID 生成、分解戦略）を trait として切り出す。
//! 実装は impls に置く。

pub mod clock;
pub mod decomposer;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decomposer::Decomposer;
pub use self::id_generator::{IdGenerator, UlidGenerator};
