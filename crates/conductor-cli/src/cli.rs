use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Conductor - task decomposition and worker-pool supervisor", long_about = None)]
#[command(version)]
pub struct Cli {
    /// YAML config file (defaults to ./conductor.yaml when present)
    #[arg(short, long, global = true, env = "CONDUCTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decompose a description, run every subtask on the demo handlers, print the final status
    Run {
        description: String,

        /// JSON object passed to every subtask as `context`
        #[arg(long, default_value = "{}")]
        context: String,

        /// Pool size (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Make the analysis handler fail this many times before succeeding
        #[arg(long, default_value_t = 0)]
        fail_first: u32,

        /// Simulated handler latency in milliseconds
        #[arg(long, default_value_t = 200)]
        latency_ms: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },

    /// Print the subtasks a description decomposes into, without running them
    Decompose {
        description: String,

        #[arg(long, default_value = "{}")]
        context: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}
