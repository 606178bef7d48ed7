//! TaskKind trait - 型付きペイロードの定義
//!
//! `Task::data` は JSON のまま保持し、handler 側でこの trait を実装した型に
//! デシリアライズする。型が合わなければ handler error（panic ではない）。
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{TaskSpec, TaskType};

/// TaskKind は task_type とペイロード型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Summarize {
///     text: String,
/// }
///
/// impl TaskKind for Summarize {
///     const TYPE: &'static str = "summarize";
/// }
/// ```
pub trait TaskKind: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn task_type() -> TaskType {
        TaskType::new(Self::TYPE)
    }

    /// Build a spec carrying `self` as its payload.
    ///
    /// Fails only if the `Serialize` impl does (e.g. a map with non-string keys).
    fn into_spec(self) -> Result<TaskSpec, serde_json::Error> {
        let data = serde_json::to_value(&self)?;
        Ok(TaskSpec::new(Self::TYPE, data))
    }
}

/// Payload shared by the built-in kinds: what to do, plus the caller's context.
macro_rules! described_kind {
    ($(#[$meta:meta])* $name:ident, $ty:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub description: String,
            #[serde(default)]
            pub context: Map<String, Value>,
        }

        impl $name {
            pub fn new(description: impl Into<String>, context: Map<String, Value>) -> Self {
                Self {
                    description: description.into(),
                    context,
                }
            }
        }

        impl TaskKind for $name {
            const TYPE: &'static str = $ty;
        }
    };
}

described_kind!(
    /// Analyse the request (always the first decomposed task).
    AnalysisTask,
    "analysis"
);
described_kind!(
    /// Produce code or content.
    GenerationTask,
    "generation"
);
described_kind!(
    /// Produce test cases / validation.
    TestingTask,
    "testing"
);
described_kind!(
    /// Anything else; also the payload the fallback handler expects.
    GeneralTask,
    "general"
);
