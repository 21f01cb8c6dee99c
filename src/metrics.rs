// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, increment_counter, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, increment_counter};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "pool_indexer_pools_stored_total",
        Unit::Count,
        "Pools normalized and appended to the corpus, labeled by pool type."
    );
    describe_counter!(
        "pool_indexer_fetch_failures_total",
        Unit::Count,
        "Failed pool fetch attempts, labeled by endpoint."
    );
    describe_counter!(
        "pool_indexer_endpoints_blacklisted_total",
        Unit::Count,
        "Times an endpoint crossed the failure threshold and was blacklisted."
    );
    describe_counter!(
        "pool_indexer_pools_skipped_total",
        Unit::Count,
        "Pool ids abandoned after exhausting retries."
    );
    describe_counter!(
        "pool_indexer_cooldowns_total",
        Unit::Count,
        "Global cooldowns entered, labeled by kind (short, long)."
    );
}

/// Installs the Prometheus exporter on `addr` and registers metric descriptions.
#[cfg(feature = "observability")]
pub fn install_exporter(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    log::info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

pub fn increment_pools_stored(pool_type: &str) {
    counter!("pool_indexer_pools_stored_total", 1, "type" => pool_type.to_string());
}

pub fn increment_fetch_failures(endpoint: &str) {
    counter!("pool_indexer_fetch_failures_total", 1, "endpoint" => endpoint.to_string());
}

pub fn increment_endpoint_blacklisted(endpoint: &str) {
    counter!("pool_indexer_endpoints_blacklisted_total", 1, "endpoint" => endpoint.to_string());
}

pub fn increment_pools_skipped() {
    increment_counter!("pool_indexer_pools_skipped_total");
}

pub fn increment_cooldowns(kind: &'static str) {
    counter!("pool_indexer_cooldowns_total", 1, "kind" => kind);
}
