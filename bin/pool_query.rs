//! # Pool Query CLI
//!
//! Read-only queries over the ingested corpus.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin pool_query -- find uosmo
//! cargo run --bin pool_query -- find-all uosmo uatom
//! cargo run --bin pool_query -- search atom
//! cargo run --bin pool_query -- pool 1
//! cargo run --bin pool_query -- decode ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use osmosis_pool_indexer::{
    denom::format_denom,
    query::{decorate, format_decorated, format_pool},
    CanonicalRecord, DenomResolver, HttpClient, PoolQuery, PriceEnricher, Settings,
};
use std::sync::Arc;

const LIST_LIMIT: usize = 20;
const SEARCH_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Osmosis Pool Query CLI", long_about = None)]
struct Args {
    /// Configuration file (optional; defaults apply when absent)
    #[arg(long, default_value = "Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find pools containing asset (partial match)
    Find { asset: Option<String> },
    /// Find pools with exact asset match
    FindExact { asset: Option<String> },
    /// Find pools containing ALL assets
    FindAll { assets: Vec<String> },
    /// Find pools containing ANY asset
    FindAny { assets: Vec<String> },
    /// Search by base denom (decodes IBC)
    Search { base_denom: Option<String> },
    /// Get pool by ID
    Pool { id: Option<String> },
    /// Decode IBC denom
    Decode { denom: Option<String> },
}

fn print_list(pools: &[&CanonicalRecord], limit: usize) {
    for pool in pools.iter().take(limit) {
        println!("{}", format_pool(pool));
        println!();
    }
    if pools.len() > limit {
        println!("... and {} more", pools.len() - limit);
    }
}

fn usage_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let settings = Settings::from_file(&args.config).context("loading configuration")?;
    let client = Arc::new(HttpClient::new(&settings).context("building HTTP client")?);
    let corpus = PoolQuery::load(&settings.storage.data_dir);

    match args.command {
        Command::Find { asset } => {
            let Some(term) = asset else {
                usage_error("asset required");
                return Ok(());
            };
            let pools = corpus.find_by_asset(&term, false);
            println!(
                "{}\n",
                format!("Found {} pools containing \"{}\":", pools.len(), term).bold()
            );
            print_list(&pools, LIST_LIMIT);
        }

        Command::FindExact { asset } => {
            let Some(term) = asset else {
                usage_error("asset required");
                return Ok(());
            };
            let pools = corpus.find_by_asset(&term, true);
            println!(
                "{}\n",
                format!("Found {} pools with exact match \"{}\":", pools.len(), term).bold()
            );
            print_list(&pools, LIST_LIMIT);
        }

        Command::FindAll { assets } => {
            if assets.len() < 2 {
                usage_error("at least 2 assets required");
                return Ok(());
            }
            let pools = corpus.find_by_all_assets(assets.as_slice(), false);
            println!(
                "{}\n",
                format!(
                    "Found {} pools containing ALL of [{}]:",
                    pools.len(),
                    assets.join(", ")
                )
                .bold()
            );
            print_list(&pools, LIST_LIMIT);
        }

        Command::FindAny { assets } => {
            if assets.len() < 2 {
                usage_error("at least 2 assets required");
                return Ok(());
            }
            let pools = corpus.find_by_any_asset(assets.as_slice(), false);
            println!(
                "{}\n",
                format!(
                    "Found {} pools containing ANY of [{}]:",
                    pools.len(),
                    assets.join(", ")
                )
                .bold()
            );
            print_list(&pools, LIST_LIMIT);
        }

        Command::Search { base_denom } => {
            let Some(term) = base_denom else {
                usage_error("base denom required");
                return Ok(());
            };
            println!("Searching for \"{}\" (decoding IBC denoms)...\n", term);
            let mut resolver = DenomResolver::from_settings(client.clone(), &settings);
            let pools = corpus.search_by_base_denom(&term, &mut resolver).await;
            println!("{}\n", format!("Found {} pools:", pools.len()).bold());

            let mut prices = PriceEnricher::load(client.clone(), &settings).await;
            for pool in pools.iter().take(SEARCH_LIMIT) {
                let decorated = decorate(pool, &mut resolver, Some(&mut prices)).await;
                println!("{}", format_decorated(&decorated));
                println!();
            }
            if pools.len() > SEARCH_LIMIT {
                println!("... and {} more", pools.len() - SEARCH_LIMIT);
            }
        }

        Command::Pool { id } => {
            let Some(id) = id else {
                usage_error("pool ID required");
                return Ok(());
            };
            let Some(pool) = id.trim().parse::<u64>().ok().and_then(|n| corpus.get_by_id(n))
            else {
                eprintln!("{}", format!("Pool {} not found", id).yellow());
                return Ok(());
            };
            let mut resolver = DenomResolver::from_settings(client.clone(), &settings);
            let mut prices = PriceEnricher::load(client.clone(), &settings).await;
            let decorated = decorate(pool, &mut resolver, Some(&mut prices)).await;
            println!("{}", format_decorated(&decorated));
        }

        Command::Decode { denom } => {
            let Some(denom) = denom else {
                usage_error("IBC denom required");
                return Ok(());
            };
            let mut resolver = DenomResolver::from_settings(client.clone(), &settings);
            let decoded = resolver.decode(&denom).await;
            if decoded.is_ibc {
                println!("Denom: {}", denom);
                println!("Base:  {}", decoded.base_denom().unwrap_or("unknown"));
                println!("Path:  {}", decoded.path().unwrap_or("unknown"));
                println!("Display: {}", format_denom(&decoded).green());
            } else {
                println!("{} is not an IBC denom", denom);
            }
        }
    }

    Ok(())
}
