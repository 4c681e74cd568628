//! CLI argument parsing for tq

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::scheduler::SchedulerConfig;

#[derive(Parser, Debug)]
#[command(name = "tq")]
#[command(author, version, about = "Run a command over a list of items at a steady pace", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a shell command once per item
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Shell command; the item is passed as $1 and in $TQ_ITEM
    #[arg(short = 'x', long, required = true)]
    pub exec: String,

    /// Milliseconds between dispatches (overrides config)
    #[arg(short, long)]
    pub delay_ms: Option<u64>,

    /// Cap on commands in flight, -1 for no cap (overrides config)
    ///
    /// With any cap, each finished command starts the next one, so a run
    /// keeps one command in flight at a time. Without a cap commands start
    /// every delay regardless of how many are still running.
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    pub max_concurrent: Option<i64>,

    /// Hold the queue for this many milliseconds before the first dispatch
    #[arg(long)]
    pub paused_for_ms: Option<u64>,

    /// Items to process; read from stdin, one per line, when omitted
    pub items: Vec<String>,
}

impl RunArgs {
    /// Scheduler config with command-line overrides applied
    pub fn scheduler_config(&self, base: &SchedulerConfig) -> SchedulerConfig {
        let mut config = base.clone();
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent = max_concurrent;
        }
        // A one-shot run has to finish, so it never idles waiting for more work
        config.persistent = false;
        config.start_paused = config.start_paused || self.paused_for_ms.is_some();
        config
    }
}

/// Parse a log level name, case-insensitively
pub fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}
