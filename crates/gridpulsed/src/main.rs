//! gridpulsed — the GridPulse daemon.
//!
//! Single binary that assembles the collection pipeline:
//! - State store (redb)
//! - JSON-RPC client (bootstrap + fallbacks)
//! - Geo enrichment service
//! - Collector (basic + detailed cycles, retention pruning)
//!
//! # Usage
//!
//! ```text
//! gridpulsed run --data-dir /var/lib/gridpulse
//! gridpulsed basic        # one-shot basic cycle, summary on stdout
//! gridpulsed detailed     # one-shot detailed cycle
//! gridpulsed status       # print the network rollup
//! ```
//!
//! `run` drives both cadences as independent, sequential loops, so no two
//! cycles of the same cadence ever overlap. The one-shot subcommands exist
//! for cron-style invocation and exit non-zero on fatal error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use gridpulse_collector::Collector;
use gridpulse_geo::GeoService;
use gridpulse_rpc::RpcClient;
use gridpulse_state::StateStore;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "gridpulsed", about = "GridPulse fleet telemetry daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run both collection cadences until interrupted.
    Run {
        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Basic cycle interval in seconds.
        #[arg(long)]
        basic_interval: Option<u64>,

        /// Detailed cycle interval in seconds.
        #[arg(long)]
        detailed_interval: Option<u64>,
    },
    /// Run one basic cycle and print its summary as JSON.
    Basic {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run one detailed cycle and print its summary as JSON.
    Detailed {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the current network rollup as JSON.
    Status {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gridpulsed=debug,gridpulse=debug".parse().unwrap()),
        )
        .init();

    let mut config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            data_dir,
            basic_interval,
            detailed_interval,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(secs) = basic_interval {
                config.basic_interval_secs = secs;
            }
            if let Some(secs) = detailed_interval {
                config.detailed_interval_secs = secs;
            }
            run_daemon(config).await
        }
        Command::Basic { data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let collector = build_collector(&config)?;
            let summary = collector.run_basic_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Detailed { data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let collector = build_collector(&config)?;
            let summary = collector.run_detailed_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Status { data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let store = open_store(&config)?;
            match store.get_network()? {
                Some(network) => println!("{}", serde_json::to_string_pretty(&network)?),
                None => println!("no collection cycle has run yet"),
            }
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.data_dir.join("gridpulse.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

fn build_collector(config: &Config) -> anyhow::Result<Collector> {
    let store = open_store(config)?;
    let rpc = RpcClient::new(config.rpc_config())?;
    let geo = GeoService::new(config.geo_config())?;
    Ok(Collector::new(store, rpc, geo).with_config(config.collector_config()))
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        bootstrap = %config.bootstrap_url,
        basic_interval = config.basic_interval_secs,
        detailed_interval = config.detailed_interval_secs,
        "gridpulse daemon starting"
    );

    let collector = Arc::new(build_collector(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let basic_handle = tokio::spawn(basic_loop(
        collector.clone(),
        Duration::from_secs(config.basic_interval_secs),
        shutdown_rx.clone(),
    ));
    let detailed_handle = tokio::spawn(detailed_loop(
        collector.clone(),
        Duration::from_secs(config.detailed_interval_secs),
        shutdown_rx.clone(),
    ));
    let prune_handle = tokio::spawn(prune_loop(collector, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = basic_handle.await;
    let _ = detailed_handle.await;
    let _ = prune_handle.await;

    info!("gridpulse daemon stopped");
    Ok(())
}

/// The basic cadence: one cycle per tick, never overlapping.
async fn basic_loop(
    collector: Arc<Collector>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "basic loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match collector.run_basic_cycle().await {
                    Ok(summary) => info!(
                        epoch = summary.epoch,
                        valid = summary.valid_nodes,
                        invalid = summary.invalid_nodes,
                        duration_ms = summary.duration_ms,
                        "basic cycle ok"
                    ),
                    Err(e) => error!(error = %e, "basic cycle failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("basic loop shutting down");
                break;
            }
        }
    }
}

/// The detailed cadence: one cycle per tick, never overlapping.
async fn detailed_loop(
    collector: Arc<Collector>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "detailed loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match collector.run_detailed_cycle().await {
                    Ok(summary) => info!(
                        epoch = summary.basic.epoch,
                        eligible = summary.detailed_eligible,
                        success = summary.detailed_success,
                        failed = summary.detailed_failed,
                        coverage = summary.detailed_stats_coverage,
                        "detailed cycle ok"
                    ),
                    Err(e) => error!(error = %e, "detailed cycle failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("detailed loop shutting down");
                break;
            }
        }
    }
}

/// Daily retention pass.
async fn prune_loop(collector: Arc<Collector>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(24 * 3600);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match collector.prune().await {
                    Ok(summary) => info!(
                        stats_rows = summary.pnode_stats_removed,
                        network_rows = summary.network_stats_removed,
                        nodes = summary.nodes_removed,
                        "prune ok"
                    ),
                    Err(e) => error!(error = %e, "prune failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("prune loop shutting down");
                break;
            }
        }
    }
}
