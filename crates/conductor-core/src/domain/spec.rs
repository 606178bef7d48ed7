//! Input specs: what a decomposer (or a caller) asks the supervisor to run.
//!
//! A `TaskSpec` has no identity yet. `Supervisor::new_task` turns it into a
//! `Task` with a fresh id and creation time.

use serde::{Deserialize, Serialize};

use super::task::TaskType;

/// Default retry budget for decomposed tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_type: TaskType,

    /// Informational only. The queue is FIFO.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Payload decoded by the handler registered for `task_type`.
    #[serde(default)]
    pub data: serde_json::Value,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl TaskSpec {
    pub fn new(task_type: impl Into<TaskType>, data: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            priority: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            data,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
