//! Demo handlers standing in for real LLM calls.
//!
//! Each one sleeps for a configurable latency (cancelled when the supervisor
//! stops) and returns a canned JSON result.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use conductor_core::HandlerError;
use conductor_core::typed::{
    AnalysisTask, GeneralTask, GenerationTask, Handler, HandlerContext, TestingTask,
};
use serde_json::{Value, json};

async fn simulate(ctx: &HandlerContext, latency: Duration) -> Result<(), HandlerError> {
    tokio::select! {
        _ = ctx.cancelled() => Err(HandlerError::failed("cancelled by shutdown")),
        _ = tokio::time::sleep(latency) => Ok(()),
    }
}

pub struct Analyst {
    latency: Duration,
    remaining_failures: AtomicU32,
}

impl Analyst {
    pub fn new(latency: Duration, fail_first: u32) -> Self {
        Self {
            latency,
            remaining_failures: AtomicU32::new(fail_first),
        }
    }
}

#[async_trait]
impl Handler<AnalysisTask> for Analyst {
    async fn handle(&self, ctx: &HandlerContext, input: AnalysisTask) -> Result<Value, HandlerError> {
        simulate(ctx, self.latency).await?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::failed(format!(
                "intentional failure (left={left})"
            )));
        }

        Ok(json!({
            "analysis_result": format!("Analysis of: {}", input.description),
            "attempt": ctx.attempt(),
        }))
    }
}

pub struct Generator {
    pub latency: Duration,
}

#[async_trait]
impl Handler<GenerationTask> for Generator {
    async fn handle(&self, ctx: &HandlerContext, input: GenerationTask) -> Result<Value, HandlerError> {
        simulate(ctx, self.latency).await?;
        Ok(json!({
            "generated_code": "// generated",
            "source": input.description,
        }))
    }
}

pub struct Tester {
    pub latency: Duration,
}

#[async_trait]
impl Handler<TestingTask> for Tester {
    async fn handle(&self, ctx: &HandlerContext, input: TestingTask) -> Result<Value, HandlerError> {
        simulate(ctx, self.latency).await?;
        Ok(json!({
            "test_cases": ["happy path", "empty input", "invalid input"],
            "source": input.description,
        }))
    }
}

/// Fallback for any type without a dedicated handler.
pub struct Fallback {
    pub latency: Duration,
}

#[async_trait]
impl Handler<GeneralTask> for Fallback {
    async fn handle(&self, ctx: &HandlerContext, input: GeneralTask) -> Result<Value, HandlerError> {
        simulate(ctx, self.latency).await?;
        Ok(json!({ "result": format!("Processed: {}", input.description) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{TaskId, WorkerId};
    use serde_json::Map;

    fn ctx() -> HandlerContext {
        let task_id: TaskId = "task-01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        HandlerContext::detached(WorkerId::new(1), task_id, 1)
    }

    #[tokio::test]
    async fn analyst_fails_first_then_succeeds() {
        let analyst = Analyst::new(Duration::ZERO, 1);
        let input = AnalysisTask::new("look", Map::new());

        assert!(analyst.handle(&ctx(), input.clone()).await.is_err());
        let out = analyst.handle(&ctx(), input).await.unwrap();
        assert_eq!(out["analysis_result"], "Analysis of: look");
    }
}
