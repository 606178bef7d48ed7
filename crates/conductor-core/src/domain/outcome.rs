//! Outcome model: what a worker reports once a task reaches a terminal state.
//!
//! These messages feed the result processor. They are a best-effort
//! notification path; the task registry stays the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ids::{TaskId, WorkerId};

/// Final outcome of a task.
///
/// Serialized as `{"kind":"success","value":...}` / `{"kind":"failure","value":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Success(serde_json::Value),
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub outcome: Outcome,

    /// Attempts spent, including the last one.
    pub attempts: u32,

    /// Duration of the last attempt, in milliseconds on the wire.
    #[serde(rename = "duration_ms", with = "super::duration_ms")]
    pub duration: Duration,

    pub completed_at: DateTime<Utc>,
}
