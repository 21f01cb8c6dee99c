// src/asset_registry.rs
//
// Chain-registry asset list: maps on-chain base denoms to CoinGecko ids and display decimals.
// The raw list is snapshotted to `assetlist.json` as { timestamp, data } and refreshed once the
// snapshot is older than the configured TTL.

use crate::client::MarketSource;
use crate::utils::{now_millis, read_json, write_json, Loaded};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

pub const ASSETLIST_FILE: &str = "assetlist.json";
pub const DEFAULT_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetList {
    #[serde(default)]
    pub chain_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetEntry {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub denom_units: Vec<DenomUnit>,
    #[serde(default)]
    pub coingecko_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenomUnit {
    pub denom: String,
    #[serde(default)]
    pub exponent: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssetSnapshot {
    timestamp: i64,
    data: AssetList,
}

/// Lookup tables built once per process from an [`AssetList`].
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    gecko_ids: HashMap<String, String>,
    decimals: HashMap<String, u32>,
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_asset_list(list: &AssetList) -> Self {
        let mut registry = Self::default();
        for asset in &list.assets {
            let Some(gecko_id) = asset.coingecko_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            if !asset.base.is_empty() {
                registry
                    .gecko_ids
                    .insert(asset.base.to_lowercase(), gecko_id.to_string());
            }

            // Display unit exponent; a missing or zero exponent keeps the default
            let decimals = asset
                .display
                .as_deref()
                .and_then(|display| asset.denom_units.iter().find(|u| u.denom == display))
                .map(|u| u.exponent)
                .filter(|exp| *exp > 0)
                .unwrap_or(DEFAULT_DECIMALS);
            registry.decimals.insert(gecko_id.to_string(), decimals);
        }
        registry
    }

    /// Loads the registry from the on-disk snapshot, refreshing it through `source` once stale.
    ///
    /// A failed refresh falls back to the stale snapshot, then to an empty registry; it never
    /// fails the caller.
    pub async fn load(source: &dyn MarketSource, data_dir: &Path, ttl: Duration) -> Self {
        let path = data_dir.join(ASSETLIST_FILE);
        let snapshot = match read_json::<AssetSnapshot>(&path) {
            Ok(Loaded::Parsed(snapshot)) => Some(snapshot),
            Ok(Loaded::Missing | Loaded::Corrupt) => None,
            Err(e) => {
                warn!("{:#}, ignoring asset list snapshot", e);
                None
            }
        };

        if let Some(snapshot) = &snapshot {
            let age_ms = now_millis().saturating_sub(snapshot.timestamp);
            if age_ms >= 0 && (age_ms as u128) < ttl.as_millis() {
                debug!("Using cached asset list ({} assets)", snapshot.data.assets.len());
                return Self::from_asset_list(&snapshot.data);
            }
        }

        info!("Fetching asset list from chain registry...");
        match source.fetch_asset_list().await {
            Ok(list) => {
                let fresh = AssetSnapshot {
                    timestamp: now_millis(),
                    data: list,
                };
                if let Err(e) = write_json(&path, &fresh) {
                    warn!("Failed to persist asset list: {:#}", e);
                }
                Self::from_asset_list(&fresh.data)
            }
            Err(e) => match snapshot {
                Some(stale) => {
                    warn!("Asset list refresh failed ({}), using stale snapshot", e);
                    Self::from_asset_list(&stale.data)
                }
                None => {
                    warn!("Asset list unavailable ({}), USD values disabled", e);
                    Self::empty()
                }
            },
        }
    }

    pub fn gecko_id(&self, denom: &str) -> Option<&str> {
        self.gecko_ids.get(&denom.to_lowercase()).map(String::as_str)
    }

    pub fn decimals_for(&self, gecko_id: &str) -> u32 {
        self.decimals
            .get(gecko_id)
            .copied()
            .unwrap_or(DEFAULT_DECIMALS)
    }

    /// Unique CoinGecko ids for the denoms that have one.
    pub fn gecko_ids_for<'a, I>(&self, denoms: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: BTreeSet<String> = denoms
            .into_iter()
            .filter_map(|d| self.gecko_id(d))
            .map(str::to_string)
            .collect();
        ids.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.gecko_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gecko_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_list() -> AssetList {
        serde_json::from_value(serde_json::json!({
            "chain_name": "osmosis",
            "assets": [
                {
                    "base": "uosmo",
                    "display": "osmo",
                    "denom_units": [{"denom": "uosmo", "exponent": 0}, {"denom": "osmo", "exponent": 6}],
                    "coingecko_id": "osmosis"
                },
                {
                    "base": "ibc/D189335C6E4A68B513C10AB227BF1C1D38C746766278BA3EEB4FB14124F1D858",
                    "display": "usdc",
                    "denom_units": [{"denom": "usdc", "exponent": 6}],
                    "coingecko_id": "usd-coin"
                },
                {
                    "base": "weth-wei",
                    "display": "weth",
                    "denom_units": [{"denom": "weth", "exponent": 18}],
                    "coingecko_id": "weth"
                },
                {
                    "base": "factory/osmo1abc/unlisted",
                    "display": "unlisted"
                },
                {
                    "base": "uzero",
                    "display": "zero",
                    "denom_units": [{"denom": "zero", "exponent": 0}],
                    "coingecko_id": "zero-coin"
                }
            ]
        }))
        .unwrap()
    }

    struct FakeMarket {
        list: Option<AssetList>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketSource for FakeMarket {
        async fn fetch_asset_list(&self) -> Result<AssetList, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.list
                .clone()
                .ok_or_else(|| FetchError::transport("assetlist", "connection refused"))
        }

        async fn fetch_usd_prices(
            &self,
            _gecko_ids: &[String],
        ) -> Result<HashMap<String, f64>, FetchError> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn test_mapping_and_decimals() {
        let registry = AssetRegistry::from_asset_list(&sample_list());
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.gecko_id("UOSMO"), Some("osmosis"));
        assert_eq!(
            registry.gecko_id(
                "ibc/d189335c6e4a68b513c10ab227bf1c1d38c746766278ba3eeb4fb14124f1d858"
            ),
            Some("usd-coin")
        );
        assert_eq!(registry.gecko_id("factory/osmo1abc/unlisted"), None);
        assert_eq!(registry.decimals_for("osmosis"), 6);
        assert_eq!(registry.decimals_for("weth"), 18);
        assert_eq!(registry.decimals_for("zero-coin"), DEFAULT_DECIMALS);
        assert_eq!(registry.decimals_for("not-listed"), DEFAULT_DECIMALS);
        assert_eq!(
            registry.gecko_ids_for(["uosmo", "weth-wei", "uosmo", "nope"]),
            vec!["osmosis".to_string(), "weth".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let market = FakeMarket {
            list: Some(sample_list()),
            calls: AtomicUsize::new(0),
        };
        let ttl = Duration::from_secs(3600);
        let first = AssetRegistry::load(&market, dir.path(), ttl).await;
        let second = AssetRegistry::load(&market, dir.path(), ttl).await;
        assert_eq!(first.len(), second.len());
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_used_when_refresh_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stale = AssetSnapshot {
            timestamp: 0,
            data: sample_list(),
        };
        write_json(&dir.path().join(ASSETLIST_FILE), &stale).unwrap();

        let offline = FakeMarket {
            list: None,
            calls: AtomicUsize::new(0),
        };
        let registry = AssetRegistry::load(&offline, dir.path(), Duration::from_secs(60)).await;
        assert_eq!(offline.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.gecko_id("uosmo"), Some("osmosis"));

        let empty_dir = tempfile::tempdir().unwrap();
        let registry =
            AssetRegistry::load(&offline, empty_dir.path(), Duration::from_secs(60)).await;
        assert!(registry.is_empty());
    }
}
