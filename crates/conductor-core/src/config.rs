//! SupervisorConfig - 起動時に固定される設定値
//!
//! 時間はすべてミリ秒の整数で持つ（YAML / 環境変数から読みやすいように）。
//! 読み込み（figment の多段マージ）は埋め込み側の責務。ここでは型と検証だけを持つ。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TaskType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be at least 1")]
    InvalidMaxWorkers(usize),

    #[error("Invalid {name}: must be at least 1")]
    ZeroCapacity { name: &'static str },

    #[error("Invalid {name}: must be greater than 0 ms")]
    ZeroInterval { name: &'static str },

    #[error("worker_capabilities cannot be empty")]
    EmptyCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Pool size. Fixed for the supervisor's lifetime.
    pub max_workers: usize,

    /// Capabilities given to every worker created from config.
    pub worker_capabilities: Vec<TaskType>,

    pub queue_capacity: usize,
    pub result_capacity: usize,

    /// How long `submit_task` waits for queue space.
    pub submit_timeout_ms: u64,

    /// Worker inbox poll period; the heartbeat is refreshed once per cycle.
    pub poll_interval_ms: u64,

    /// Dispatcher pause after re-queueing a task nobody can take.
    pub dispatch_backoff_ms: u64,

    /// How long `stop()` waits for routines before aborting them.
    pub shutdown_grace_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            worker_capabilities: ["analysis", "generation", "testing", "general"]
                .into_iter()
                .map(TaskType::from)
                .collect(),
            queue_capacity: 100,
            result_capacity: 100,
            submit_timeout_ms: 5_000,
            poll_interval_ms: 100,
            dispatch_backoff_ms: 50,
            shutdown_grace_ms: 500,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidMaxWorkers(self.max_workers));
        }
        if self.worker_capabilities.is_empty() {
            return Err(ConfigError::EmptyCapabilities);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "queue_capacity",
            });
        }
        if self.result_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "result_capacity",
            });
        }
        for (name, ms) in [
            ("submit_timeout_ms", self.submit_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("dispatch_backoff_ms", self.dispatch_backoff_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::ZeroInterval { name });
            }
        }
        Ok(())
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dispatch_backoff(&self) -> Duration {
        Duration::from_millis(self.dispatch_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let config = SupervisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.submit_timeout(), Duration::from_secs(5));
        assert_eq!(config.worker_capabilities.len(), 4);
    }

    #[test]
    fn partial_yaml_like_input_keeps_defaults() {
        let config: SupervisorConfig =
            serde_json::from_value(serde_json::json!({ "max_workers": 8 })).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[rstest]
    #[case::no_workers(SupervisorConfig { max_workers: 0, ..Default::default() }, ConfigError::InvalidMaxWorkers(0))]
    #[case::no_caps(SupervisorConfig { worker_capabilities: vec![], ..Default::default() }, ConfigError::EmptyCapabilities)]
    #[case::zero_queue(SupervisorConfig { queue_capacity: 0, ..Default::default() }, ConfigError::ZeroCapacity { name: "queue_capacity" })]
    #[case::zero_results(SupervisorConfig { result_capacity: 0, ..Default::default() }, ConfigError::ZeroCapacity { name: "result_capacity" })]
    #[case::zero_poll(SupervisorConfig { poll_interval_ms: 0, ..Default::default() }, ConfigError::ZeroInterval { name: "poll_interval_ms" })]
    fn invalid_configs(#[case] config: SupervisorConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate().unwrap_err(), expected);
    }
}
