//! tq - paced task queue runner
//!
//! CLI entry point: feeds items through a [`Scheduler`] that runs a shell
//! command per item.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use taskqueue::cli::{Cli, Command, RunArgs, parse_level};
use taskqueue::config::Config;
use taskqueue::scheduler::{Processor, Scheduler};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

    debug!(?level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run(args) => cmd_run(&config, args).await,
        Command::Config => cmd_config(&config),
    }
}

/// Outcome of running the command for one item
#[derive(Debug)]
enum ItemOutcome {
    Succeeded,
    Failed,
}

/// Run the command once per item and report a summary
async fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    debug!(?args, "cmd_run: called");
    let scheduler_config = args.scheduler_config(&config.scheduler);

    let items = if args.items.is_empty() {
        read_stdin_items().await.context("Failed to read items from stdin")?
    } else {
        args.items.clone()
    };
    if items.is_empty() {
        println!("No items to process");
        return Ok(());
    }
    let total = items.len();

    let (tx, mut rx) = mpsc::unbounded_channel::<ItemOutcome>();
    let command = Arc::new(args.exec.clone());
    let processor = Processor::from_async(move |item: String| {
        let tx = tx.clone();
        let command = Arc::clone(&command);
        async move {
            let outcome = run_item(&command, &item).await;
            let _ = tx.send(outcome);
        }
    })?;

    let scheduler = Scheduler::builder()
        .processor(processor)
        .config(scheduler_config)
        .on_complete(|| info!("All items dispatched"))
        .build()
        .context("Failed to create scheduler")?;

    scheduler.enqueue_tail_all(items);
    info!(total, concurrency = ?scheduler.concurrency(), "Queued items");

    if let Some(ms) = args.paused_for_ms {
        debug!(ms, "cmd_run: holding queue before first dispatch");
        tokio::time::sleep(Duration::from_millis(ms)).await;
        scheduler.resume();
    }

    let mut succeeded = 0;
    let mut failed = 0;
    while succeeded + failed < total {
        match rx.recv().await {
            Some(ItemOutcome::Succeeded) => succeeded += 1,
            Some(ItemOutcome::Failed) => failed += 1,
            None => break,
        }
    }

    let stats = scheduler.stats();
    println!(
        "dispatched={} completed={} failed={}",
        stats.total_dispatched,
        succeeded + failed,
        failed
    );

    if failed > 0 {
        return Err(eyre!("{} of {} items failed", failed, total));
    }
    Ok(())
}

async fn run_item(command: &str, item: &str) -> ItemOutcome {
    debug!(%item, "run_item: called");
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .arg("tq")
        .arg(item)
        .env("TQ_ITEM", item)
        .status()
        .await;

    match status {
        Ok(status) if status.success() => ItemOutcome::Succeeded,
        Ok(status) => {
            warn!(%item, ?status, "Command failed");
            ItemOutcome::Failed
        }
        Err(e) => {
            warn!(%item, error = %e, "Failed to spawn command");
            ItemOutcome::Failed
        }
    }
}

async fn read_stdin_items() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut items = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            items.push(line.to_string());
        }
    }
    Ok(items)
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}
