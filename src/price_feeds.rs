// src/price_feeds.rs

use crate::asset_registry::AssetRegistry;
use crate::client::MarketSource;
use crate::normalization::scale_amount;
use crate::settings::Settings;
use crate::utils::{now_millis, read_json_or_default, write_json};
use log::{debug, warn};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const PRICES_FILE: &str = "prices.json";

/// Persisted price cache (`prices.json`).
///
/// `timestamp` is the time of the last successful batch. Freshness is judged per id from
/// `fetchedAt`; documents written without it take `timestamp` for every price on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCache {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub fetched_at: BTreeMap<String, i64>,
}

impl PriceCache {
    fn backfill_fetched_at(&mut self) {
        for id in self.prices.keys() {
            self.fetched_at.entry(id.clone()).or_insert(self.timestamp);
        }
    }

    fn is_fresh(&self, id: &str, now: i64, ttl: Duration) -> bool {
        if !self.prices.contains_key(id) {
            return false;
        }
        self.fetched_at
            .get(id)
            .map_or(false, |at| (now.saturating_sub(*at).max(0) as u128) <= ttl.as_millis())
    }
}

/// USD enrichment over the asset registry and CoinGecko.
///
/// ## Features
///
/// - **Batching**: every stale or missing id in a request goes out in one `simple/price` call
/// - **Persisted cache**: prices survive restarts for the TTL (default 5 minutes)
/// - **Graceful degradation**: a failed price call is logged and the cached prices are served
///
/// ## Usage
///
/// ```rust,ignore
/// let mut prices = PriceEnricher::load(Arc::new(client), &settings).await;
/// let usd = prices.usd_value("uosmo", "2500000").await;
/// println!("{}", usd.map(format_usd).unwrap_or_else(|| "N/A".into()));
/// ```
pub struct PriceEnricher {
    source: Arc<dyn MarketSource>,
    registry: AssetRegistry,
    cache_path: PathBuf,
    cache: PriceCache,
    ttl: Duration,
}

impl PriceEnricher {
    pub fn new(
        source: Arc<dyn MarketSource>,
        registry: AssetRegistry,
        data_dir: &Path,
        ttl: Duration,
    ) -> Self {
        let cache_path = data_dir.join(PRICES_FILE);
        let mut cache: PriceCache = read_json_or_default(&cache_path);
        cache.backfill_fetched_at();
        Self {
            source,
            registry,
            cache_path,
            cache,
            ttl,
        }
    }

    /// Builds the asset registry (snapshot or refresh) and opens the price cache.
    pub async fn load(source: Arc<dyn MarketSource>, settings: &Settings) -> Self {
        let data_dir = &settings.storage.data_dir;
        let registry = AssetRegistry::load(
            source.as_ref(),
            data_dir,
            Duration::from_secs(settings.prices.assetlist_ttl_seconds),
        )
        .await;
        Self::new(
            source,
            registry,
            data_dir,
            Duration::from_secs(settings.prices.price_ttl_seconds),
        )
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn gecko_id(&self, denom: &str) -> Option<&str> {
        self.registry.gecko_id(denom)
    }

    pub fn decimals_for(&self, gecko_id: &str) -> u32 {
        self.registry.decimals_for(gecko_id)
    }

    /// Ensures every id in `gecko_ids` has a fresh price where CoinGecko knows one.
    pub async fn fetch_prices<S: AsRef<str>>(&mut self, gecko_ids: &[S]) -> &BTreeMap<String, f64> {
        let now = now_millis();
        let needed: BTreeSet<String> = gecko_ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| !id.is_empty() && !self.cache.is_fresh(id, now, self.ttl))
            .map(str::to_string)
            .collect();

        if needed.is_empty() {
            return &self.cache.prices;
        }

        let batch: Vec<String> = needed.into_iter().collect();
        debug!("Fetching {} prices: {}", batch.len(), batch.join(","));
        match self.source.fetch_usd_prices(&batch).await {
            Ok(prices) => {
                for (id, usd) in prices {
                    self.cache.fetched_at.insert(id.clone(), now);
                    self.cache.prices.insert(id, usd);
                }
                self.cache.timestamp = now;
                if let Err(e) = write_json(&self.cache_path, &self.cache) {
                    warn!("Failed to persist price cache: {:#}", e);
                }
            }
            Err(e) => warn!("Price fetch error: {}", e),
        }
        &self.cache.prices
    }

    /// Prefetches prices for every priced denom in one batch.
    pub async fn prefetch<'a, I>(&mut self, denoms: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids = self.registry.gecko_ids_for(denoms);
        self.fetch_prices(&ids).await;
    }

    pub async fn price(&mut self, denom: &str) -> Option<f64> {
        let gecko_id = self.registry.gecko_id(denom)?.to_string();
        let prices = self.fetch_prices(&[gecko_id.as_str()]).await;
        prices.get(&gecko_id).copied().filter(|p| *p > 0.0)
    }

    /// `raw_amount / 10^decimals * price`, or `None` when the denom has no price mapping.
    pub async fn usd_value(&mut self, denom: &str, raw_amount: &str) -> Option<Decimal> {
        let price = self.price(denom).await?;
        let gecko_id = self.registry.gecko_id(denom)?;
        let decimals = self.registry.decimals_for(gecko_id);
        let amount = scale_amount(raw_amount, decimals)?;
        amount.checked_mul(Decimal::from_f64(price)?)
    }
}

/// `<$0.01`, `$X.XX`, `$X.XXK` or `$X.XXM`; each band includes its lower bound.
pub fn format_usd(value: Decimal) -> String {
    let thousand = Decimal::from(1_000);
    let million = Decimal::from(1_000_000);

    if value < Decimal::new(1, 2) {
        "<$0.01".to_string()
    } else if value < thousand {
        format!("${}", two_places(value))
    } else if value < million {
        format!("${}K", two_places(value / thousand))
    } else {
        format!("${}M", two_places(value / million))
    }
}

fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}
