//! Errors - エラー型と分類
//!
//! - **SupervisorError**: 呼び出し側に同期的に返すエラー（投入・参照・起動）
//! - **HandlerError**: handler 実行の失敗。リトライ後はタスクの `error` に残る
//! - **DecomposeError**: 分解の不変条件違反（通常の入力では発生しない）
//!
//! 「適格な worker がいない」はエラーではなく再キューで扱う。

use std::time::Duration;

use thiserror::Error;

use super::ids::TaskId;
use super::task::TaskType;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("task queue is full (waited {timeout:?})")]
    QueueFull { timeout: Duration },

    #[error("task queue is closed")]
    QueueClosed,

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {0} is already registered")]
    DuplicateTask(TaskId),

    #[error("supervisor is already started")]
    AlreadyStarted,

    #[error(transparent)]
    Decompose(#[from] DecomposeError),
}

impl SupervisorError {
    /// Lookup failures are a distinct kind from execution failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SupervisorError::TaskNotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid payload for task_type={task_type}: {message}")]
    InvalidPayload { task_type: TaskType, message: String },

    #[error("no handler registered for task_type={0} and no general fallback")]
    NoHandler(TaskType),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecomposeError {
    #[error("decomposition produced no tasks")]
    Empty,

    #[error("invalid decomposition: {0}")]
    Invalid(String),
}
