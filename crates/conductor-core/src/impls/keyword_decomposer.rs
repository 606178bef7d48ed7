//! KeywordDecomposer - キーワードによるルールベース分解
//!
//! # ルール（上から順に出力）
//! 1. 常に "analysis"（priority 5）
//! 2. "code" / "review" を含む → "generation"（priority 4）
//! 3. "test" / "validate" を含む → "testing"（priority 3）
//!
//! 大文字小文字は区別しない。部分一致なので "codebase" も "code" に当たる。

use serde_json::{Map, Value};

use crate::domain::{DEFAULT_MAX_RETRIES, DecomposeError, TaskSpec};
use crate::ports::Decomposer;
use crate::typed::{AnalysisTask, GenerationTask, TaskKind, TestingTask};

const GENERATION_KEYWORDS: &[&str] = &["code", "review"];
const TESTING_KEYWORDS: &[&str] = &["test", "validate"];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordDecomposer;

impl KeywordDecomposer {
    pub fn new() -> Self {
        Self
    }
}

fn mentions(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

fn subtask<K: TaskKind>(kind: K, priority: i32) -> Result<TaskSpec, DecomposeError> {
    let spec = kind
        .into_spec()
        .map_err(|e| DecomposeError::Invalid(format!("{} payload: {e}", K::TYPE)))?;
    Ok(spec
        .with_priority(priority)
        .with_max_retries(DEFAULT_MAX_RETRIES))
}

impl Decomposer for KeywordDecomposer {
    fn decompose(
        &self,
        description: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<TaskSpec>, DecomposeError> {
        let lowered = description.to_lowercase();

        let mut specs = vec![subtask(AnalysisTask::new(description, context.clone()), 5)?];

        if mentions(&lowered, GENERATION_KEYWORDS) {
            specs.push(subtask(
                GenerationTask::new("Code analysis subtask", context.clone()),
                4,
            )?);
        }

        if mentions(&lowered, TESTING_KEYWORDS) {
            specs.push(subtask(
                TestingTask::new("Testing subtask", context.clone()),
                3,
            )?);
        }

        Ok(specs)
    }
}
