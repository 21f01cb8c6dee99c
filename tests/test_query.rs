//! Integration tests for the query layer over a persisted corpus
//!
//! Tests cover:
//! - Loading `pools.json` written by the ingester
//! - Base-denom search through IBC resolution
//! - Decoration with display names, USD values and TVL

use async_trait::async_trait;
use osmosis_pool_indexer::{
    asset_registry::{AssetList, AssetRegistry},
    denom::DenomTrace,
    query::{decorate, format_decorated},
    types::{Fees, LiquidityEntry, SlotMap},
    CanonicalRecord, DenomResolver, FetchError, MarketSource, PoolQuery, PoolStore, PoolType,
    PriceEnricher, TraceSource,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ATOM_HASH: &str = "27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";
const USDC_HASH: &str = "D189335C6E4A68B513C10AB227BF1C1D38C746766278BA3EEB4FB14124F1D858";

struct StaticTraces {
    calls: AtomicUsize,
}

#[async_trait]
impl TraceSource for StaticTraces {
    async fn fetch_denom_trace(
        &self,
        endpoint: &str,
        hash: &str,
    ) -> Result<DenomTrace, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match hash {
            ATOM_HASH => Ok(DenomTrace {
                base_denom: "uatom".to_string(),
                path: "transfer/channel-0".to_string(),
            }),
            USDC_HASH => Ok(DenomTrace {
                base_denom: "uusdc".to_string(),
                path: "transfer/channel-750".to_string(),
            }),
            _ => Err(FetchError::Status {
                url: endpoint.to_string(),
                status: 404,
            }),
        }
    }
}

struct StaticMarket;

#[async_trait]
impl MarketSource for StaticMarket {
    async fn fetch_asset_list(&self) -> Result<AssetList, FetchError> {
        Err(FetchError::transport("assetlist", "offline"))
    }

    async fn fetch_usd_prices(
        &self,
        gecko_ids: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        let mut prices = HashMap::new();
        for id in gecko_ids {
            match id.as_str() {
                "osmosis" => prices.insert(id.clone(), 0.5),
                "cosmos" => prices.insert(id.clone(), 10.0),
                _ => None,
            };
        }
        Ok(prices)
    }
}

fn record(id: u64, coins: &[(&str, &str)], swap_fee: &str) -> CanonicalRecord {
    let mut assets = SlotMap::new();
    let mut liquidity = SlotMap::new();
    for (i, (denom, amount)) in coins.iter().enumerate() {
        let slot = i as u32 + 1;
        assets.insert(slot, denom.to_string());
        liquidity.insert(
            slot,
            LiquidityEntry {
                denom: denom.to_string(),
                amount: amount.to_string(),
            },
        );
    }
    CanonicalRecord {
        id,
        address: format!("osmo1pool{}", id),
        pool_type: PoolType::Gamm,
        assets,
        liquidity: Some(liquidity),
        fees: Fees {
            swap_fee: swap_fee.to_string(),
            exit_fee: String::new(),
        },
    }
}

fn seed_corpus(dir: &Path) {
    let store = PoolStore::open(dir).unwrap();
    let atom = format!("ibc/{}", ATOM_HASH);
    let usdc = format!("ibc/{}", USDC_HASH);
    store
        .append(&record(1, &[("uosmo", "2000000000"), (atom.as_str(), "300000000")], "0.002"))
        .unwrap();
    store
        .append(&record(2, &[("uosmo", "1000000"), (usdc.as_str(), "1000000")], "0.0005"))
        .unwrap();
    store
        .append(&record(3, &[("uion", "5000000"), ("uosmo", "7000000")], ""))
        .unwrap();
}

fn registry() -> AssetRegistry {
    let list: AssetList = serde_json::from_value(serde_json::json!({
        "assets": [
            {"base": "uosmo", "display": "osmo",
             "denom_units": [{"denom": "osmo", "exponent": 6}], "coingecko_id": "osmosis"},
            {"base": format!("ibc/{}", ATOM_HASH), "display": "atom",
             "denom_units": [{"denom": "atom", "exponent": 6}], "coingecko_id": "cosmos"}
        ]
    }))
    .unwrap();
    AssetRegistry::from_asset_list(&list)
}

fn resolver(dir: &Path) -> (DenomResolver, Arc<StaticTraces>) {
    let traces = Arc::new(StaticTraces {
        calls: AtomicUsize::new(0),
    });
    let resolver = DenomResolver::new(traces.clone(), vec!["http://lcd".to_string()], dir);
    (resolver, traces)
}

#[test]
fn test_load_and_filter_persisted_corpus() {
    let dir = tempfile::tempdir().unwrap();
    seed_corpus(dir.path());

    let query = PoolQuery::load(dir.path());
    assert_eq!(query.len(), 3);

    let ids = |pools: Vec<&CanonicalRecord>| pools.iter().map(|p| p.id).collect::<Vec<_>>();
    assert_eq!(ids(query.find_by_asset("osmo", false)), vec![1, 2, 3]);
    assert_eq!(ids(query.find_by_asset("uion", true)), vec![3]);
    assert_eq!(ids(query.find_by_all_assets(&["uosmo", "uion"], true)), vec![3]);
    assert_eq!(
        ids(query.find_by_any_asset(&["uion", format!("ibc/{}", USDC_HASH).as_str()], true)),
        vec![2, 3]
    );
    assert_eq!(query.get_by_id(2).map(|p| p.address.as_str()), Some("osmo1pool2"));
}

#[test]
fn test_missing_corpus_queries_empty() {
    let dir = tempfile::tempdir().unwrap();
    let query = PoolQuery::load(dir.path());
    assert!(query.is_empty());
    assert!(query.find_by_asset("uosmo", false).is_empty());
}

#[tokio::test]
async fn test_search_by_base_denom_decodes_ibc() {
    let dir = tempfile::tempdir().unwrap();
    seed_corpus(dir.path());
    let query = PoolQuery::load(dir.path());
    let (mut resolver, traces) = resolver(dir.path());

    let hits: Vec<u64> = query
        .search_by_base_denom("ATOM", &mut resolver)
        .await
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(hits, vec![1]);

    let hits: Vec<u64> = query
        .search_by_base_denom("usdc", &mut resolver)
        .await
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(hits, vec![2]);

    // raw matches short-circuit before any lookup is needed for that pool
    let hits = query.search_by_base_denom("uion", &mut resolver).await;
    assert_eq!(hits.len(), 1);

    // each hash resolved once across all searches
    assert_eq!(traces.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_search_asks_once_for_unresolvable_hash() {
    let dir = tempfile::tempdir().unwrap();
    let unknown = format!("ibc/{}", "0".repeat(64));
    let store = PoolStore::open(dir.path()).unwrap();
    for id in 1..=3 {
        store
            .append(&record(id, &[("uosmo", "1"), (unknown.as_str(), "1")], ""))
            .unwrap();
    }
    let query = PoolQuery::load(dir.path());
    let (mut resolver, traces) = resolver(dir.path());

    assert!(query.search_by_base_denom("atom", &mut resolver).await.is_empty());
    assert_eq!(traces.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_decorate_with_prices_and_tvl() {
    let dir = tempfile::tempdir().unwrap();
    seed_corpus(dir.path());
    let query = PoolQuery::load(dir.path());
    let (mut resolver, _) = resolver(dir.path());
    let mut prices = PriceEnricher::new(
        Arc::new(StaticMarket),
        registry(),
        dir.path(),
        Duration::from_secs(300),
    );

    let pool = query.get_by_id(1).unwrap();
    let decorated = decorate(pool, &mut resolver, Some(&mut prices)).await;

    assert_eq!(decorated.assets.len(), 2);
    assert_eq!(decorated.assets[0].display, "uosmo");
    assert_eq!(decorated.assets[1].display, "uatom (channel-0)");
    // 2000 OSMO at $0.50 and 300 ATOM at $10
    assert_eq!(decorated.assets[0].usd, Some(Decimal::from(1000)));
    assert_eq!(decorated.assets[1].usd, Some(Decimal::from(3000)));
    assert_eq!(decorated.tvl, Some(Decimal::from(4000)));

    let text = format_decorated(&decorated);
    assert!(text.starts_with("Pool #1 (gamm)"));
    assert!(text.contains("    1: uosmo [2.00K] ($1.00K)"));
    assert!(text.contains("    2: uatom (channel-0) [300] ($3.00K)"));
    assert!(text.contains("  Swap Fee: 0.20%"));
    assert!(text.ends_with("  TVL: $4.00K"));
}

#[tokio::test]
async fn test_decorate_without_prices_has_no_tvl() {
    let dir = tempfile::tempdir().unwrap();
    seed_corpus(dir.path());
    let query = PoolQuery::load(dir.path());
    let (mut resolver, _) = resolver(dir.path());

    let decorated = decorate(query.get_by_id(3).unwrap(), &mut resolver, None).await;
    assert!(decorated.tvl.is_none());
    assert!(decorated.assets.iter().all(|a| a.usd.is_none()));
    assert_eq!(decorated.assets[1].amount.as_deref(), Some("7"));

    let text = format_decorated(&decorated);
    assert!(!text.contains("TVL"));
    assert!(!text.contains("Swap Fee"));
}
