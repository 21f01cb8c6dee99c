use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Endpoints {
    /// LCD/REST endpoints serving `/osmosis/poolmanager/...`, tried round-robin
    #[serde(default = "default_rest_urls")]
    pub rest_urls: Vec<String>,
    /// Endpoints queried in order for IBC denom traces
    #[serde(default = "default_trace_urls")]
    pub trace_urls: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_rest_urls() -> Vec<String> {
    vec![
        "https://lcd.osmosis.zone".to_string(),
        "https://rest.lavenderfive.com:443/osmosis".to_string(),
        "https://rest-osmosis.ecostake.com".to_string(),
        "https://osmosis-api.polkachu.com".to_string(),
        "https://rest.osmosis.goldenratiostaking.net".to_string(),
    ]
}
fn default_trace_urls() -> Vec<String> {
    vec![
        "https://rest-osmosis.ecostake.com".to_string(),
        "https://lcd.osmosis.zone".to_string(),
    ]
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rest_urls: default_rest_urls(),
            trace_urls: default_trace_urls(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Three escalation levels: per-attempt backoff, id abandonment, global cooldown.
#[derive(Debug, Deserialize, Clone)]
pub struct Retry {
    /// Failed attempts on one pool id before it is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on every further failure of the same id
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Pause between two successfully stored pools
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Consecutive failures (across ids) that trigger a cooldown
    #[serde(default = "default_short_wait_threshold")]
    pub short_wait_threshold: u32,
    #[serde(default = "default_short_wait_ms")]
    pub short_wait_ms: u64,
    /// Short cooldowns allowed before one long cooldown
    #[serde(default = "default_short_wait_max_count")]
    pub short_wait_max_count: u32,
    #[serde(default = "default_long_wait_ms")]
    pub long_wait_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_request_delay_ms() -> u64 {
    100 // fast iteration with multiple endpoints
}
fn default_short_wait_threshold() -> u32 {
    15
}
fn default_short_wait_ms() -> u64 {
    60_000 // 1 minute
}
fn default_short_wait_max_count() -> u32 {
    3
}
fn default_long_wait_ms() -> u64 {
    300_000 // 5 minutes
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            request_delay_ms: default_request_delay_ms(),
            short_wait_threshold: default_short_wait_threshold(),
            short_wait_ms: default_short_wait_ms(),
            short_wait_max_count: default_short_wait_max_count(),
            long_wait_ms: default_long_wait_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Blacklist {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_blacklist_duration_seconds")]
    pub duration_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_blacklist_duration_seconds() -> u64 {
    3600 // 1 hour
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            duration_seconds: default_blacklist_duration_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Prices {
    #[serde(default = "default_assetlist_url")]
    pub assetlist_url: String,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    #[serde(default = "default_price_ttl_seconds")]
    pub price_ttl_seconds: u64,
    #[serde(default = "default_assetlist_ttl_seconds")]
    pub assetlist_ttl_seconds: u64,
}

fn default_assetlist_url() -> String {
    "https://raw.githubusercontent.com/cosmos/chain-registry/master/osmosis/assetlist.json"
        .to_string()
}
fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price".to_string()
}
fn default_price_ttl_seconds() -> u64 {
    300 // 5 min
}
fn default_assetlist_ttl_seconds() -> u64 {
    86_400 // 24h
}

impl Default for Prices {
    fn default() -> Self {
        Self {
            assetlist_url: default_assetlist_url(),
            coingecko_url: default_coingecko_url(),
            price_ttl_seconds: default_price_ttl_seconds(),
            assetlist_ttl_seconds: default_assetlist_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Ingestion {
    /// Fetch `total_pool_liquidity` alongside every pool (two concurrent requests per attempt)
    #[serde(default)]
    pub fetch_liquidity: bool,
    /// Overrides the resume id computed from the corpus
    #[serde(default)]
    pub start_id: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub blacklist: Blacklist,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub prices: Prices,
    #[serde(default)]
    pub ingestion: Ingestion,
}

impl Settings {
    /// Loads `Config.toml` (optional) and applies `POOL_INDEXER_*` environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Ok(raw) = env::var("POOL_INDEXER_REST_URLS") {
            if let Some(list) = parse_string_list(&raw) {
                if !list.is_empty() {
                    settings.endpoints.rest_urls = list;
                }
            }
        }
        if let Ok(raw) = env::var("POOL_INDEXER_TRACE_URLS") {
            if let Some(list) = parse_string_list(&raw) {
                if !list.is_empty() {
                    settings.endpoints.trace_urls = list;
                }
            }
        }
        if let Ok(dir) = env::var("POOL_INDEXER_DATA_DIR") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                settings.storage.data_dir = PathBuf::from(trimmed);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.rest_urls.is_empty() {
            return Err(ConfigError::Message(
                "endpoints.rest_urls must list at least one endpoint".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Message(
                "retry.max_retries must be non-zero".to_string(),
            ));
        }
        if self.retry.short_wait_threshold == 0 || self.blacklist.failure_threshold == 0 {
            return Err(ConfigError::Message(
                "failure thresholds must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.endpoints.request_timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.retry.request_delay_ms)
    }
}

/// Accepts a JSON array (`["a","b"]`), a bracketed list without quotes, or a plain comma list.
fn parse_string_list(input: &str) -> Option<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(vec![]);
    }

    if trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Some(v);
        }
        let without_brackets = trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim();
        return Some(split_list(without_brackets));
    }

    Some(split_list(trimmed))
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
