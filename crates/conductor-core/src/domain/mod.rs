//! Domain model (ids, tasks, workers, outcomes, errors).
//!
//! 依存なしの純粋なデータ型と状態遷移のみを置く。
//! キュー・ロック・非同期処理は app 層の責務。

pub mod decision;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod spec;
pub mod state;
pub mod task;
pub mod worker;

pub use decision::Decision;
pub use errors::{DecomposeError, HandlerError, SupervisorError};
pub use ids::{Id, IdMarker, ParseIdError, TaskId, WorkerId};
pub use outcome::{Outcome, TaskResult};
pub use spec::{DEFAULT_MAX_RETRIES, TaskSpec};
pub use state::{TaskStatus, WorkerStatus};
pub use task::{Task, TaskType};
pub use worker::{Worker, WorkerPerformance};

/// Serialize `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
