//! # Upstream HTTP sources
//!
//! Every network interaction of the crate goes through one of three traits, so the ingestion
//! loop, the denom resolver and the price enricher can be driven by test doubles:
//!
//! - [`PoolSource`]: `GET pools/{id}` and `GET pools/{id}/total_pool_liquidity` on an LCD endpoint
//! - [`TraceSource`]: `GET denom_traces/{hash}` on an LCD endpoint
//! - [`MarketSource`]: the chain-registry asset list and CoinGecko `simple/price`
//!
//! [`HttpClient`] implements all three over `reqwest`. Any non-2xx status or body that fails to
//! decode into the expected envelope is a [`FetchError`].

use crate::asset_registry::AssetList;
use crate::denom::DenomTrace;
use crate::settings::Settings;
use crate::types::{FetchError, LiquidityEntry};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait PoolSource: Send + Sync {
    /// Raw pool body (the object under `pool`).
    async fn fetch_pool(&self, endpoint: &str, pool_id: u64) -> Result<Value, FetchError>;

    async fn fetch_liquidity(
        &self,
        endpoint: &str,
        pool_id: u64,
    ) -> Result<Vec<LiquidityEntry>, FetchError>;
}

#[async_trait]
pub trait TraceSource: Send + Sync {
    async fn fetch_denom_trace(&self, endpoint: &str, hash: &str)
        -> Result<DenomTrace, FetchError>;
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_asset_list(&self) -> Result<AssetList, FetchError>;

    /// USD prices keyed by CoinGecko id. Ids unknown to CoinGecko are simply absent.
    async fn fetch_usd_prices(&self, gecko_ids: &[String])
        -> Result<HashMap<String, f64>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct PoolEnvelope {
    pool: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LiquidityEnvelope {
    liquidity: Option<Vec<LiquidityEntry>>,
}

#[derive(Debug, Deserialize)]
struct TraceEnvelope {
    denom_trace: Option<RawDenomTrace>,
}

#[derive(Debug, Deserialize)]
struct RawDenomTrace {
    #[serde(default)]
    path: String,
    base_denom: String,
}

// CoinGecko returns { "<id>": { "usd": <price> } }
type CoinGeckoPriceResponse = HashMap<String, CoinGeckoTokenPrice>;

#[derive(Debug, Deserialize)]
struct CoinGeckoTokenPrice {
    usd: Option<f64>,
}

pub fn pool_path(pool_id: u64) -> String {
    format!("/osmosis/poolmanager/v1beta1/pools/{}", pool_id)
}

pub fn liquidity_path(pool_id: u64) -> String {
    format!(
        "/osmosis/poolmanager/v1beta1/pools/{}/total_pool_liquidity",
        pool_id
    )
}

pub fn denom_trace_path(hash: &str) -> String {
    format!("/ibc/apps/transfer/v1/denom_traces/{}", hash)
}

/// `reqwest`-backed implementation of every source trait.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    assetlist_url: String,
    coingecko_url: String,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            client,
            assetlist_url: settings.prices.assetlist_url.clone(),
            coingecko_url: settings.prices.coingecko_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::malformed(url, e))
    }
}

fn join(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

#[async_trait]
impl PoolSource for HttpClient {
    async fn fetch_pool(&self, endpoint: &str, pool_id: u64) -> Result<Value, FetchError> {
        let url = join(endpoint, &pool_path(pool_id));
        let envelope: PoolEnvelope = self.get_json(&url).await?;
        envelope
            .pool
            .ok_or_else(|| FetchError::malformed(&url, "missing `pool` field"))
    }

    async fn fetch_liquidity(
        &self,
        endpoint: &str,
        pool_id: u64,
    ) -> Result<Vec<LiquidityEntry>, FetchError> {
        let url = join(endpoint, &liquidity_path(pool_id));
        let envelope: LiquidityEnvelope = self.get_json(&url).await?;
        envelope
            .liquidity
            .ok_or_else(|| FetchError::malformed(&url, "missing `liquidity` field"))
    }
}

#[async_trait]
impl TraceSource for HttpClient {
    async fn fetch_denom_trace(
        &self,
        endpoint: &str,
        hash: &str,
    ) -> Result<DenomTrace, FetchError> {
        let url = join(endpoint, &denom_trace_path(hash));
        let envelope: TraceEnvelope = self.get_json(&url).await?;
        let raw = envelope
            .denom_trace
            .ok_or_else(|| FetchError::malformed(&url, "missing `denom_trace` field"))?;
        Ok(DenomTrace {
            base_denom: raw.base_denom,
            path: raw.path,
        })
    }
}

#[async_trait]
impl MarketSource for HttpClient {
    async fn fetch_asset_list(&self) -> Result<AssetList, FetchError> {
        self.get_json(&self.assetlist_url).await
    }

    async fn fetch_usd_prices(
        &self,
        gecko_ids: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        if gecko_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{}?ids={}&vs_currencies=usd",
            self.coingecko_url,
            gecko_ids.join(",")
        );
        let response: CoinGeckoPriceResponse = self.get_json(&url).await?;
        Ok(response
            .into_iter()
            .filter_map(|(id, price)| price.usd.map(|usd| (id, usd)))
            .collect())
    }
}
