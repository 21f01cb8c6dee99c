//! # Pool Indexer Service
//!
//! Long-running ingester that harvests Osmosis pools into `data/pools.json`.
//!
//! ## Overview
//!
//! This service:
//! - Resumes from the last stored pool id (or `--start-id`)
//! - Rotates across the configured REST endpoints with backoff, blacklisting and cooldowns
//! - Records abandoned ids in `data/skipped.json`; `backfill` retries them
//! - Handles graceful shutdown on Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin pool_indexer -- run
//! cargo run --bin pool_indexer -- run --start-id 1200 --end-id 1300
//! cargo run --bin pool_indexer -- backfill
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use osmosis_pool_indexer::{HttpClient, Ingester, Settings};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable Osmosis pool ingester", long_about = None)]
struct Args {
    /// Configuration file (optional; defaults apply when absent)
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Address for the Prometheus exporter, e.g. 0.0.0.0:9000
    #[cfg(feature = "observability")]
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest pools from the resume id onwards (the default)
    Run {
        /// First pool id to fetch, overriding the corpus resume id
        #[arg(long)]
        start_id: Option<u64>,
        /// Stop before this pool id
        #[arg(long)]
        end_id: Option<u64>,
    },
    /// Retry pool ids recorded in the skip list
    Backfill,
}

fn init_logging() {
    #[cfg(feature = "observability")]
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing_subscriber::filter::LevelFilter::INFO)
            .init();
    }
    #[cfg(not(feature = "observability"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let settings = Settings::from_file(&args.config).context("loading configuration")?;

    #[cfg(feature = "observability")]
    {
        if let Some(addr) = args.metrics_addr {
            osmosis_pool_indexer::metrics::install_exporter(addr)?;
        }
    }

    let client = Arc::new(HttpClient::new(&settings).context("building HTTP client")?);
    let mut ingester = Ingester::from_settings(client, &settings)?;
    info!(
        "Corpus at {} ({} endpoints configured)",
        ingester.store().path().display(),
        ingester.endpoints().len()
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl+C received, stopping after the current step...");
            shutdown.cancel();
        }
    });

    let command = args.command.unwrap_or(Command::Run {
        start_id: None,
        end_id: None,
    });
    let report = match command {
        Command::Run { start_id, end_id } => {
            ingester
                .run(start_id.or(settings.ingestion.start_id), end_id, cancel)
                .await?
        }
        Command::Backfill => ingester.backfill(cancel).await?,
    };

    let (healthy, blacklisted) = ingester.endpoints().health_at(std::time::Instant::now());
    info!(
        "Done: {} stored, {} skipped, next id {} (endpoints: {} healthy, {} blacklisted)",
        report.stored,
        report.skipped.len(),
        report.next_id,
        healthy,
        blacklisted
    );
    Ok(())
}
