//! # Ingestion Orchestrator
//!
//! The `Ingester` walks pool ids one at a time, fetching each pool from the endpoint registry,
//! normalizing it and appending it to the corpus.
//!
//! ## Overview
//!
//! For every id the ingester:
//! - Selects a healthy endpoint (round-robin, blacklisted endpoints skipped)
//! - Fetches the pool, plus its liquidity concurrently when `fetch_liquidity` is set
//! - On success: normalizes, appends, resets retry state and moves to the next id
//! - On failure: rotates endpoint, backs off, and abandons the id once retries are exhausted
//! - Enters a global cooldown when failures keep piling up across ids
//!
//! Abandoned ids go to the skip list; [`Ingester::backfill`] retries them later and inserts
//! recovered pools at their sorted position.
//!
//! ## Cancellation
//!
//! Every suspension point (fetch, backoff wait, cooldown wait, inter-record delay) races the
//! `CancellationToken`, so a run stops promptly without leaving a half-written record.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use osmosis_pool_indexer::orchestrator::Ingester;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut ingester = Ingester::from_settings(source, &settings)?;
//! let cancel = CancellationToken::new();
//! let report = ingester.run(None, None, cancel.clone()).await?;
//! ```

use crate::{
    backoff::{Cooldown, FailureAction, RetryPolicy, RetryState},
    client::PoolSource,
    metrics,
    pool_store::PoolStore,
    pools::{merge_liquidity, normalize},
    rest_pool::RestPool,
    settings::Settings,
    skip_list::SkipList,
    types::{CanonicalRecord, FetchError},
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Summary of one `run` or `backfill` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: u64,
    pub skipped: Vec<u64>,
    /// Next id the loop would have fetched
    pub next_id: u64,
    pub cancelled: bool,
}

enum Outcome {
    Stored(CanonicalRecord),
    Abandoned,
    Cancelled,
}

pub struct Ingester {
    source: Arc<dyn PoolSource>,
    endpoints: RestPool,
    policy: RetryPolicy,
    retry: RetryState,
    store: PoolStore,
    skipped: SkipList,
    fetch_liquidity: bool,
    request_delay: Duration,
    cursor: usize,
}

impl Ingester {
    pub fn new(
        source: Arc<dyn PoolSource>,
        endpoints: RestPool,
        policy: RetryPolicy,
        store: PoolStore,
        fetch_liquidity: bool,
        request_delay: Duration,
    ) -> Result<Self> {
        let skipped = SkipList::open(store.data_dir()).context("opening skip list")?;
        let retry = RetryState::new(&policy);
        Ok(Self {
            source,
            endpoints,
            policy,
            retry,
            store,
            skipped,
            fetch_liquidity,
            request_delay,
            cursor: 0,
        })
    }

    /// Opens the store and endpoint registry described by `settings`.
    ///
    /// Fails (before any fetch) when the data directory cannot be created or no endpoint is
    /// usable.
    pub fn from_settings(source: Arc<dyn PoolSource>, settings: &Settings) -> Result<Self> {
        let store = PoolStore::open(&settings.storage.data_dir).context("opening pool store")?;
        let endpoints = RestPool::from_settings(settings)?;
        Self::new(
            source,
            endpoints,
            RetryPolicy::from_settings(settings),
            store,
            settings.ingestion.fetch_liquidity,
            settings.request_delay(),
        )
    }

    pub fn store(&self) -> &PoolStore {
        &self.store
    }

    pub fn skip_list(&self) -> &SkipList {
        &self.skipped
    }

    pub fn endpoints(&self) -> &RestPool {
        &self.endpoints
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    /// Ingests ids from `start` (default: the corpus resume id) up to `end` (exclusive, default:
    /// unbounded) until cancelled.
    pub async fn run(
        &mut self,
        start: Option<u64>,
        end: Option<u64>,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let mut pool_id = match start {
            Some(id) => id,
            None => self.store.resume_id()?,
        };
        info!(
            "Starting ingestion at pool {} ({} endpoints, {} skipped ids pending)",
            pool_id,
            self.endpoints.len(),
            self.skipped.len()
        );

        let mut report = IngestReport::default();
        while end.map_or(true, |end| pool_id < end) {
            match self.ingest_one(pool_id, &cancel).await {
                Outcome::Stored(record) => {
                    self.store.append(&record)?;
                    info!(
                        "✅ Stored pool {} ({}, {} assets)",
                        record.id,
                        record.pool_type,
                        record.assets.len()
                    );
                    metrics::increment_pools_stored(record.pool_type.as_str());
                    report.stored += 1;
                }
                Outcome::Abandoned => {
                    self.skipped.record(pool_id)?;
                    metrics::increment_pools_skipped();
                    report.skipped.push(pool_id);
                }
                Outcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }
            pool_id += 1;

            if !pause(self.request_delay, &cancel).await {
                report.cancelled = true;
                break;
            }
        }

        report.next_id = pool_id;
        info!(
            "Ingestion stopped at pool {}: {} stored, {} skipped{}",
            report.next_id,
            report.stored,
            report.skipped.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Retries every id on the skip list once through the normal retry controller.
    ///
    /// Recovered pools are inserted at their sorted position and removed from the list; ids
    /// that fail again stay on it.
    pub async fn backfill(&mut self, cancel: CancellationToken) -> Result<IngestReport> {
        let pending = self.skipped.ids();
        info!("Backfilling {} skipped pools", pending.len());

        let mut report = IngestReport::default();
        for pool_id in pending {
            match self.ingest_one(pool_id, &cancel).await {
                Outcome::Stored(record) => {
                    self.store.insert_sorted(&record)?;
                    self.skipped.resolve(pool_id)?;
                    metrics::increment_pools_stored(record.pool_type.as_str());
                    report.stored += 1;
                }
                Outcome::Abandoned => {
                    warn!("Pool {} still unavailable, keeping it on the skip list", pool_id);
                    report.skipped.push(pool_id);
                }
                Outcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }
            if !pause(self.request_delay, &cancel).await {
                report.cancelled = true;
                break;
            }
        }

        report.next_id = self.store.resume_id()?;
        info!(
            "Backfill finished: {} recovered, {} still skipped",
            report.stored,
            self.skipped.len()
        );
        Ok(report)
    }

    async fn ingest_one(&mut self, pool_id: u64, cancel: &CancellationToken) -> Outcome {
        loop {
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let idx = self.endpoints.select(self.cursor);
            let endpoint = self.endpoints.address(idx).to_string();
            debug!("Fetching pool {} from {}", pool_id, endpoint);

            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Outcome::Cancelled,
                res = fetch_record(self.source.as_ref(), &endpoint, pool_id, self.fetch_liquidity) => res,
            };

            let err = match attempt {
                Ok(record) => {
                    self.endpoints.record_success(idx);
                    self.retry.on_success();
                    self.cursor = idx;
                    return Outcome::Stored(record);
                }
                Err(err) => err,
            };

            warn!("⚠️ Pool {} failed on {}: {}", pool_id, endpoint, err);
            self.endpoints.record_failure(idx);
            self.cursor = self.endpoints.next_index(idx);

            let outcome = self.retry.on_failure(&self.policy);
            if let Some(cooldown) = outcome.cooldown {
                let kind = match cooldown {
                    Cooldown::Short(_) => "short",
                    Cooldown::Long(_) => "long",
                };
                warn!(
                    "Too many consecutive failures, entering {} cooldown for {:?}",
                    kind,
                    cooldown.duration()
                );
                metrics::increment_cooldowns(kind);
                if !pause(cooldown.duration(), cancel).await {
                    return Outcome::Cancelled;
                }
            }

            match outcome.action {
                FailureAction::Retry { delay } => {
                    debug!("Retrying pool {} in {:?}", pool_id, delay);
                    if !pause(delay, cancel).await {
                        return Outcome::Cancelled;
                    }
                }
                FailureAction::Abandon => {
                    warn!(
                        "Giving up on pool {} after {} attempts, recording it as skipped",
                        pool_id, self.policy.max_retries
                    );
                    return Outcome::Abandoned;
                }
            }
        }
    }
}

/// One attempt against one endpoint. With `with_liquidity` both requests run concurrently and
/// either failing fails the attempt.
async fn fetch_record(
    source: &dyn PoolSource,
    endpoint: &str,
    pool_id: u64,
    with_liquidity: bool,
) -> Result<CanonicalRecord, FetchError> {
    if !with_liquidity {
        let raw = source.fetch_pool(endpoint, pool_id).await?;
        return Ok(normalize(&raw, pool_id));
    }

    let (raw, coins) = tokio::try_join!(
        source.fetch_pool(endpoint, pool_id),
        source.fetch_liquidity(endpoint, pool_id)
    )?;
    let mut record = normalize(&raw, pool_id);
    merge_liquidity(&mut record, coins);
    Ok(record)
}

/// Sleeps for `duration` unless cancelled first. Returns `false` on cancellation.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
