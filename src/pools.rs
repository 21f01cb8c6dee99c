// src/pools.rs

//! Classification and extraction of raw `poolmanager` pool bodies into [`CanonicalRecord`]s.
//!
//! Osmosis serves several pool schemas from the same endpoint, discriminated by the `@type`
//! tag. Each known variant has its own extractor; anything else degrades to an `unknown` record
//! with empty assets and fees so an unattended ingestion run never halts on a new schema.

use crate::types::{CanonicalRecord, Fees, LiquidityEntry, PoolType, SlotMap};
use log::debug;
use serde_json::Value;

/// Type-tag substrings in precedence order. Stableswap tags also contain `gamm`
/// (`/osmosis.gamm.poolmodels.stableswap.v1beta1.Pool`), so the order is significant.
const CLASSIFICATION_ORDER: [(&str, PoolType); 4] = [
    ("concentratedliquidity", PoolType::Concentrated),
    ("stableswap", PoolType::Stableswap),
    ("cosmwasmpool", PoolType::Cosmwasm),
    ("gamm", PoolType::Gamm),
];

pub fn classify(type_tag: &str) -> PoolType {
    let tag = type_tag.to_ascii_lowercase();
    CLASSIFICATION_ORDER
        .iter()
        .find(|(needle, _)| tag.contains(needle))
        .map(|(_, pool_type)| *pool_type)
        .unwrap_or(PoolType::Unknown)
}

/// Per-variant extraction result.
#[derive(Debug, Default)]
struct PoolShape {
    assets: SlotMap<String>,
    liquidity: Option<SlotMap<LiquidityEntry>>,
    fees: Fees,
}

/// Builds the canonical record for one raw pool body (the object under `pool`).
///
/// `requested_id` is used when neither `id` nor `pool_id` is present.
pub fn normalize(raw: &Value, requested_id: u64) -> CanonicalRecord {
    let type_tag = raw.get("@type").and_then(Value::as_str).unwrap_or_default();
    let pool_type = classify(type_tag);

    let id = first_field(raw, &["id", "pool_id"])
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(requested_id);
    let address = first_field(raw, &["address", "contract_address"]).unwrap_or_default();

    let shape = match pool_type {
        PoolType::Concentrated => extract_concentrated(raw),
        PoolType::Stableswap => extract_stableswap(raw),
        PoolType::Cosmwasm => extract_cosmwasm(raw),
        PoolType::Gamm => extract_gamm(raw),
        PoolType::Unknown => {
            debug!("Pool {} has unrecognized type {:?}", id, type_tag);
            PoolShape::default()
        }
    };

    CanonicalRecord {
        id,
        address,
        pool_type,
        assets: shape.assets,
        liquidity: shape.liquidity,
        fees: shape.fees,
    }
}

/// Merges a `total_pool_liquidity` listing into `record`.
///
/// Coins are matched to existing asset slots by denom; coins with no matching slot get a new
/// slot, which is how cosmwasm pools without a token list acquire their assets.
pub fn merge_liquidity(record: &mut CanonicalRecord, coins: Vec<LiquidityEntry>) {
    if coins.is_empty() {
        return;
    }
    let liquidity = record.liquidity.get_or_insert_with(SlotMap::new);
    for coin in coins {
        let slot = match record.assets.iter().find(|(_, d)| **d == coin.denom) {
            Some((slot, _)) => *slot,
            None => {
                let slot = next_slot(&record.assets);
                record.assets.insert(slot, coin.denom.clone());
                slot
            }
        };
        liquidity.insert(slot, coin);
    }
}

fn next_slot(assets: &SlotMap<String>) -> u32 {
    assets.keys().max().map(|s| s + 1).unwrap_or(1)
}

fn extract_concentrated(raw: &Value) -> PoolShape {
    let mut assets = SlotMap::new();
    for (slot, key) in [(1u32, "token0"), (2u32, "token1")] {
        if let Some(denom) = string_at(raw, key) {
            assets.insert(slot, denom);
        }
    }
    PoolShape {
        assets,
        liquidity: None,
        fees: Fees {
            swap_fee: string_at(raw, "spread_factor").unwrap_or_default(),
            exit_fee: String::new(),
        },
    }
}

fn extract_stableswap(raw: &Value) -> PoolShape {
    let coins: Vec<LiquidityEntry> = array_at(raw, "pool_liquidity")
        .iter()
        .filter_map(coin_from)
        .collect();
    let (assets, liquidity) = slots_from_coins(coins);
    PoolShape {
        assets,
        liquidity,
        fees: pool_params_fees(raw),
    }
}

fn extract_cosmwasm(raw: &Value) -> PoolShape {
    // Token lists show up either as bare denoms or as coin objects depending on the contract.
    let assets = array_at(raw, "tokens")
        .iter()
        .filter_map(|t| match t {
            Value::String(s) => Some(s.clone()),
            other => string_at(other, "denom"),
        })
        .enumerate()
        .map(|(i, denom)| (i as u32 + 1, denom))
        .collect();
    PoolShape {
        assets,
        liquidity: None,
        fees: Fees::default(),
    }
}

fn extract_gamm(raw: &Value) -> PoolShape {
    let coins: Vec<LiquidityEntry> = array_at(raw, "pool_assets")
        .iter()
        .filter_map(|asset| asset.get("token").and_then(coin_from))
        .collect();
    let (assets, liquidity) = slots_from_coins(coins);
    PoolShape {
        assets,
        liquidity,
        fees: pool_params_fees(raw),
    }
}

fn slots_from_coins(
    coins: Vec<LiquidityEntry>,
) -> (SlotMap<String>, Option<SlotMap<LiquidityEntry>>) {
    let mut assets = SlotMap::new();
    let mut liquidity = SlotMap::new();
    for (i, coin) in coins.into_iter().enumerate() {
        let slot = i as u32 + 1;
        assets.insert(slot, coin.denom.clone());
        if !coin.amount.is_empty() {
            liquidity.insert(slot, coin);
        }
    }
    let liquidity = (!liquidity.is_empty()).then_some(liquidity);
    (assets, liquidity)
}

fn pool_params_fees(raw: &Value) -> Fees {
    let params = raw.get("pool_params").unwrap_or(&Value::Null);
    Fees {
        swap_fee: string_at(params, "swap_fee").unwrap_or_default(),
        exit_fee: string_at(params, "exit_fee").unwrap_or_default(),
    }
}

fn coin_from(v: &Value) -> Option<LiquidityEntry> {
    let denom = string_at(v, "denom")?;
    Some(LiquidityEntry {
        denom,
        amount: string_at(v, "amount").unwrap_or_default(),
    })
}

fn array_at<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_at(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| string_at(v, k))
}
