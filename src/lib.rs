//! # Osmosis Pool Indexer
//!
//! A resumable indexer for Osmosis liquidity pools. Pools are harvested one id at a time from a
//! set of redundant LCD/REST endpoints, normalized into one canonical shape across pool types,
//! and persisted to a JSON corpus that a query layer reads, decodes and prices.
//!
//! ## Overview
//!
//! - **Ingestion**: round-robin endpoint selection with blacklisting, exponential backoff,
//!   id abandonment and global cooldowns
//! - **Normalization**: concentrated, stableswap, cosmwasm and gamm pools into [`CanonicalRecord`]
//! - **Persistence**: append-style `pools.json`, resumable from the last stored id, with a skip
//!   list for later backfill
//! - **Enrichment**: IBC denom resolution with a permanent cache, USD values from CoinGecko
//!
//! ## Architecture
//!
//! ### Ingestion Layer
//! `rest_pool` tracks endpoint health, `backoff` decides between retry, abandon and cooldown, and
//! `orchestrator` drives the loop under a cancellation token.
//!
//! ### Normalization Layer
//! `pools` classifies a raw pool by its `@type` tag and extracts assets, liquidity and fees.
//!
//! ### Query Layer
//! `query` filters the corpus; `denom` and `price_feeds` decorate results for display.

// Core Types
/// Canonical pool records and fetch errors
pub mod types;
/// Pool classification and per-type extraction
pub mod pools;

// Ingestion Layer
/// Upstream HTTP client and source traits
pub mod client;
/// Endpoint registry with failure tracking and blacklisting
pub mod rest_pool;
/// Retry, abandon and cooldown policy
pub mod backoff;
/// Ingestion run-loop
pub mod orchestrator;

// Persistence
/// Resumable pool corpus
pub mod pool_store;
/// Abandoned pool ids awaiting backfill
pub mod skip_list;

// Enrichment & Query
/// IBC denom trace resolution
pub mod denom;
/// Chain-registry asset list
pub mod asset_registry;
/// CoinGecko prices and USD formatting
pub mod price_feeds;
/// Amount scaling and display
pub mod normalization;
/// Corpus filtering and pool display
pub mod query;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// JSON file helpers
pub mod utils;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use client::{HttpClient, MarketSource, PoolSource, TraceSource};
pub use denom::DenomResolver;
pub use orchestrator::{IngestReport, Ingester};
pub use pool_store::PoolStore;
pub use price_feeds::PriceEnricher;
pub use query::PoolQuery;
pub use settings::Settings;
pub use types::{CanonicalRecord, FetchError, PoolType};
