mod cli;
mod demo;
mod logging;
mod settings;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use conductor_core::{Supervisor, SupervisorBuilder, Task, TaskStatus};
use conductor_core::typed::{AnalysisTask, GeneralTask, GenerationTask, TestingTask};
use serde_json::{Map, Value, json};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::cli::{Cli, Command, LogFormatArg};
use crate::settings::{LogFormat, Settings};

const POLL_EVERY: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        };
    }
    logging::init(&settings.logging)?;

    match cli.command {
        Command::Config => print_json(&settings),
        Command::Decompose {
            description,
            context,
        } => {
            let supervisor = SupervisorBuilder::new()
                .config(settings.supervisor)
                .build()?;
            let tasks = supervisor.decompose_task(&description, &parse_context(&context)?)?;
            print_json(&tasks)
        }
        Command::Run {
            description,
            context,
            workers,
            fail_first,
            latency_ms,
            wait_secs,
        } => {
            if let Some(workers) = workers {
                settings.supervisor.max_workers = workers;
            }
            let latency = Duration::from_millis(latency_ms);
            let supervisor = SupervisorBuilder::new()
                .config(settings.supervisor)
                .handler::<AnalysisTask, _>(demo::Analyst::new(latency, fail_first))?
                .handler::<GenerationTask, _>(demo::Generator { latency })?
                .handler::<TestingTask, _>(demo::Tester { latency })?
                .handler::<GeneralTask, _>(demo::Fallback { latency })?
                .expect_handlers(&["analysis", "generation", "testing", "general"])
                .build()?;

            let context = parse_context(&context)?;
            run(&supervisor, &description, &context, Duration::from_secs(wait_secs)).await
        }
    }
}

async fn run(
    supervisor: &Supervisor,
    description: &str,
    context: &Map<String, Value>,
    wait: Duration,
) -> Result<()> {
    supervisor.start().await?;

    let tasks = supervisor.decompose_task(description, context)?;
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    info!(count = tasks.len(), "submitting decomposed tasks");
    supervisor.submit_tasks(tasks).await?;

    let finished = tokio::select! {
        finished = wait_for_terminal(supervisor, &ids, wait) => finished?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping");
            false
        }
    };
    if !finished {
        warn!(wait_secs = wait.as_secs(), "not every task reached a terminal state");
    }

    let mut final_tasks: Vec<Task> = Vec::with_capacity(ids.len());
    for id in &ids {
        final_tasks.push(supervisor.task_status(*id).await?);
    }
    let report = json!({
        "tasks": final_tasks,
        "workers": supervisor.worker_status().await,
        "system": supervisor.system_status().await,
    });

    supervisor.stop().await;
    print_json(&report)
}

/// `true` once every task is Completed or Failed, `false` on timeout.
async fn wait_for_terminal(
    supervisor: &Supervisor,
    ids: &[conductor_core::TaskId],
    wait: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + wait;
    loop {
        let mut done = true;
        for id in ids {
            let task = supervisor.task_status(*id).await?;
            if !matches!(task.status, TaskStatus::Completed | TaskStatus::Failed) {
                done = false;
                break;
            }
        }
        if done {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(POLL_EVERY).await;
    }
}

fn parse_context(raw: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(raw).context("--context must be a JSON object")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_must_be_an_object() {
        assert_eq!(parse_context(r#"{"repo":"x"}"#).unwrap()["repo"], "x");
        assert!(parse_context("[1, 2]").is_err());
        assert!(parse_context("not json").is_err());
    }

    #[tokio::test]
    async fn run_completes_every_decomposed_task() {
        let latency = Duration::from_millis(1);
        let supervisor = SupervisorBuilder::new()
            .workers(2, &["general"])
            .handler::<AnalysisTask, _>(demo::Analyst::new(latency, 1))
            .unwrap()
            .handler::<GeneralTask, _>(demo::Fallback { latency })
            .unwrap()
            .build()
            .unwrap();
        supervisor.start().await.unwrap();

        let tasks = supervisor
            .decompose_task("write some code", &Map::new())
            .unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
        supervisor.submit_tasks(tasks).await.unwrap();

        assert!(wait_for_terminal(&supervisor, &ids, Duration::from_secs(5)).await.unwrap());
        for id in &ids {
            let task = supervisor.task_status(*id).await.unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
        }
        supervisor.stop().await;
    }
}
