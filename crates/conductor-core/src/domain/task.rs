use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::decision::Decision;
use super::ids::{TaskId, WorkerId};
use super::spec::TaskSpec;
use super::state::TaskStatus;

/// Handler selector ("analysis", "generation", "testing", "general", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    /// Fallback type: a worker with this capability accepts any task,
    /// and its handler runs tasks whose type has no handler of its own.
    pub const GENERAL: &'static str = "general";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn general() -> Self {
        Self::new(Self::GENERAL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_general(&self) -> bool {
        self.0 == Self::GENERAL
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One unit of decomposed work.
///
/// The registry owns the authoritative copy; every `Task` handed out by the
/// supervisor is a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub priority: i32,
    pub data: serde_json::Value,
    pub status: TaskStatus,
    pub max_retries: u32,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<WorkerId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            task_type: spec.task_type,
            priority: spec.priority,
            data: spec.data,
            status: TaskStatus::Pending,
            max_retries: spec.max_retries,
            retry_count: 0,
            created_at,
            started_at: None,
            completed_at: None,
            assigned_to: None,
            result: None,
            error: None,
        }
    }

    /// Attempts made so far, including the one in flight.
    pub fn attempts(&self) -> u32 {
        match self.status {
            TaskStatus::Pending => self.retry_count,
            _ => self.retry_count + 1,
        }
    }

    /// Pending -> Running. `started_at` is overwritten on every attempt.
    pub fn start_attempt(&mut self, worker: WorkerId, now: DateTime<Utc>) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Running));
        self.status = TaskStatus::Running;
        self.assigned_to = Some(worker);
        self.started_at = Some(now);
        self.completed_at = None;
    }

    /// Running -> Completed.
    pub fn mark_completed(&mut self, result: serde_json::Value, now: DateTime<Utc>) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Completed));
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(now);
        self.assigned_to = None;
    }

    /// Running -> Pending (retry) or Running -> Failed (budget exhausted).
    ///
    /// Returns the decision so the caller knows whether to re-queue.
    pub fn record_failure(&mut self, error: String, now: DateTime<Utc>) -> Decision {
        let decision = Decision::after_failure(self.retry_count, self.max_retries);
        self.error = Some(error);
        self.completed_at = Some(now);
        self.assigned_to = None;
        match decision {
            Decision::Requeue { retry } => {
                self.retry_count = retry;
                self.status = TaskStatus::Pending;
            }
            Decision::MarkFailed => {
                self.status = TaskStatus::Failed;
            }
        }
        decision
    }

    /// Put an undispatchable task back to Pending without consuming a retry.
    pub(crate) fn release(&mut self) {
        self.status = TaskStatus::Pending;
        self.assigned_to = None;
    }
}
