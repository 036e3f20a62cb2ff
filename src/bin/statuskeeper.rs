use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use statuskeeper::{StatusKeeper, StatusKeeperConfig};

#[derive(Parser)]
#[command(author, version, about = "Sync New Relic alert violations to statuspage.io")]
struct Cli {
    /// YAML config file. Environment variables override its values.
    #[arg(long, env = "STATUSKEEPER_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Reconcile on every poll interval until interrupted
    Run,
    /// Run a single cycle and print its report as JSON
    Once,
    /// Check connectivity to New Relic and statuspage.io
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(cli.config)?;
    let keeper = StatusKeeper::from_config(config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&keeper).await,
        Command::Once => {
            let report = keeper.run_once().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Check => {
            let health = keeper.health_check().await;
            println!("{}", health.message());
            if !health.ok() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(explicit: Option<PathBuf>) -> Result<StatusKeeperConfig> {
    let path = explicit.or_else(default_config_path);
    let mut config = match path {
        Some(path) if path.exists() => {
            info!(path = %path.display(), "loading config");
            StatusKeeperConfig::load_from_path(&path)?
        }
        Some(path) => {
            warn!(path = %path.display(), "config file not found, using environment only");
            StatusKeeperConfig::default()
        }
        None => StatusKeeperConfig::default(),
    };
    config.apply_env()?;

    let keys: Vec<String> = config.newrelic.api_keys.iter().map(|k| k.masked()).collect();
    info!(
        newrelic_keys = ?keys,
        page_id = %config.masked_page_id(),
        statuspage_key = %config.statuspage.api_key,
        poll_interval_secs = config.poll_interval_secs,
        "configuration loaded"
    );
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    let home = env::var("HOME").ok()?;
    Some(Path::new(&home).join(".statuskeeper").join("config.yaml"))
}

async fn run(keeper: &StatusKeeper) -> Result<()> {
    let health = keeper.health_check().await;
    if health.ok() {
        info!("{}", health.message());
    } else {
        warn!("{}", health.message());
    }

    let scheduler = keeper.start();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested, waiting for in-flight cycle");
    let cycles = scheduler.shutdown().await?;
    info!(completed = cycles, "stopped");
    Ok(())
}
