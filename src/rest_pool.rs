// src/rest_pool.rs

use crate::metrics;
use crate::settings::Settings;
use anyhow::Result;
use log::{info, warn};
use std::time::{Duration, Instant};
use url::Url;

/// Health record of one upstream REST endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    address: String,
    consecutive_failures: u32,
    blacklisted_until: Option<Instant>,
}

impl Endpoint {
    fn new(address: String) -> Self {
        Self {
            address,
            consecutive_failures: 0,
            blacklisted_until: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn blacklisted_until(&self) -> Option<Instant> {
        self.blacklisted_until
    }

    /// Expiry is evaluated lazily against `now`; there is no timer clearing the flag.
    pub fn is_blacklisted_at(&self, now: Instant) -> bool {
        matches!(self.blacklisted_until, Some(until) if until > now)
    }
}

/// Blacklisting rule applied by [`RestPool::record_failure`].
#[derive(Debug, Clone, Copy)]
pub struct BlacklistPolicy {
    pub failure_threshold: u32,
    pub duration: Duration,
}

impl BlacklistPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            failure_threshold: settings.blacklist.failure_threshold,
            duration: Duration::from_secs(settings.blacklist.duration_seconds),
        }
    }
}

impl Default for BlacklistPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            duration: Duration::from_secs(3600),
        }
    }
}

/// Static, round-robin list of REST endpoints with per-endpoint failure tracking.
///
/// The pool is owned by the ingestion loop and mutated only after each attempt, so it needs no
/// interior locking.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut pool = RestPool::from_settings(&settings)?;
/// let idx = pool.select(cursor);
/// match fetch(pool.address(idx)).await {
///     Ok(_) => pool.record_success(idx),
///     Err(_) => pool.record_failure(idx),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RestPool {
    endpoints: Vec<Endpoint>,
    policy: BlacklistPolicy,
}

impl RestPool {
    /// Builds the pool from a static address list. Unparseable URLs are dropped with a warning;
    /// an empty result is an error.
    pub fn new(addresses: &[String], policy: BlacklistPolicy) -> Result<Self> {
        let endpoints: Vec<Endpoint> = addresses
            .iter()
            .filter_map(|raw| match Url::parse(raw) {
                Ok(_) => Some(Endpoint::new(raw.trim_end_matches('/').to_string())),
                Err(e) => {
                    warn!("Ignoring invalid endpoint {}: {}", raw, e);
                    None
                }
            })
            .collect();

        if endpoints.is_empty() {
            return Err(anyhow::anyhow!("No valid REST endpoints could be created"));
        }

        info!("REST pool initialized with {} endpoints", endpoints.len());
        Ok(Self { endpoints, policy })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.endpoints.rest_urls,
            BlacklistPolicy::from_settings(settings),
        )
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoint(&self, idx: usize) -> &Endpoint {
        &self.endpoints[idx % self.endpoints.len()]
    }

    pub fn address(&self, idx: usize) -> &str {
        self.endpoint(idx).address()
    }

    /// Index following `idx` in round-robin order.
    pub fn next_index(&self, idx: usize) -> usize {
        (idx + 1) % self.endpoints.len()
    }

    pub fn select(&self, index: usize) -> usize {
        self.select_at(index, Instant::now())
    }

    /// Starting at `index`, returns the first endpoint that is not blacklisted at `now`.
    ///
    /// When every endpoint is blacklisted the endpoint at `index` is returned anyway, so the
    /// loop keeps making progress on an unhealthy endpoint rather than stalling.
    pub fn select_at(&self, index: usize, now: Instant) -> usize {
        let n = self.endpoints.len();
        let start = index % n;
        for offset in 0..n {
            let idx = (start + offset) % n;
            if !self.endpoints[idx].is_blacklisted_at(now) {
                return idx;
            }
        }
        warn!(
            "All {} endpoints are blacklisted, falling back to {}",
            n, self.endpoints[start].address
        );
        start
    }

    pub fn record_success(&mut self, idx: usize) {
        let n = self.endpoints.len();
        let endpoint = &mut self.endpoints[idx % n];
        endpoint.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self, idx: usize) {
        self.record_failure_at(idx, Instant::now());
    }

    /// Counts a failure; at the threshold the endpoint is blacklisted until `now + duration`.
    pub fn record_failure_at(&mut self, idx: usize, now: Instant) {
        let n = self.endpoints.len();
        let policy = self.policy;
        let endpoint = &mut self.endpoints[idx % n];
        endpoint.consecutive_failures += 1;
        metrics::increment_fetch_failures(&endpoint.address);

        if endpoint.consecutive_failures >= policy.failure_threshold {
            endpoint.blacklisted_until = Some(now + policy.duration);
            warn!(
                "Blacklisting {} for {}s after {} consecutive failures",
                endpoint.address,
                policy.duration.as_secs(),
                endpoint.consecutive_failures
            );
            metrics::increment_endpoint_blacklisted(&endpoint.address);
        }
    }

    /// (healthy, blacklisted) counts at `now`.
    pub fn health_at(&self, now: Instant) -> (usize, usize) {
        let blacklisted = self
            .endpoints
            .iter()
            .filter(|e| e.is_blacklisted_at(now))
            .count();
        (self.endpoints.len() - blacklisted, blacklisted)
    }
}
