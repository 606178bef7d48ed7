//! Decomposer port - タスク記述をサブタスクに分解する戦略
//!
//! デフォルトはキーワードベースの `KeywordDecomposer`（impls）。
//! LLM による planner に差し替えても Supervisor の公開 API は変わらない。

use serde_json::{Map, Value};

use crate::domain::{DecomposeError, TaskSpec};

/// Decomposer は description + context から TaskSpec の列を作る
///
/// # 契約
/// - 返す列は実行したい順（キューは FIFO）
/// - 空の列は `DecomposeError::Empty`（Supervisor 側でも検査する）
/// - ID と作成時刻は付けない（Supervisor が付与する）
pub trait Decomposer: Send + Sync {
    fn decompose(
        &self,
        description: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<TaskSpec>, DecomposeError>;
}
