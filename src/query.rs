//! # Pool query engine
//!
//! Read-only filtering and display over the persisted corpus. Asset matching is
//! case-insensitive; `exact` switches between equality and substring matching.
//!
//! Enrichment is layered on top: [`decorate`] resolves IBC denoms through a [`DenomResolver`]
//! and, when a [`PriceEnricher`] is supplied, attaches USD values and a TVL figure.

use crate::denom::{format_denom, DecodedDenom, DenomResolver, IBC_PREFIX};
use crate::normalization::{format_amount, format_fee_percent};
use crate::pool_store::{PoolCorpus, POOLS_FILE};
use crate::price_feeds::{format_usd, PriceEnricher};
use crate::types::CanonicalRecord;
use crate::utils::read_json_or_default;
use rust_decimal::Decimal;
use std::path::Path;

pub struct PoolQuery {
    pools: Vec<CanonicalRecord>,
}

impl PoolQuery {
    pub fn new(pools: Vec<CanonicalRecord>) -> Self {
        Self { pools }
    }

    /// Reads `pools.json` under `data_dir`; a missing or corrupt corpus queries as empty.
    pub fn load(data_dir: &Path) -> Self {
        let corpus: PoolCorpus = read_json_or_default(&data_dir.join(POOLS_FILE));
        Self::new(corpus.pools)
    }

    pub fn pools(&self) -> &[CanonicalRecord] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn find_by_asset(&self, term: &str, exact: bool) -> Vec<&CanonicalRecord> {
        let term = term.to_lowercase();
        self.pools
            .iter()
            .filter(|p| has_asset(p, &term, exact))
            .collect()
    }

    /// Pools holding every term.
    pub fn find_by_all_assets<S: AsRef<str>>(
        &self,
        terms: &[S],
        exact: bool,
    ) -> Vec<&CanonicalRecord> {
        let terms = lowercase_all(terms);
        self.pools
            .iter()
            .filter(|p| terms.iter().all(|t| has_asset(p, t, exact)))
            .collect()
    }

    /// Pools holding at least one term.
    pub fn find_by_any_asset<S: AsRef<str>>(
        &self,
        terms: &[S],
        exact: bool,
    ) -> Vec<&CanonicalRecord> {
        let terms = lowercase_all(terms);
        self.pools
            .iter()
            .filter(|p| terms.iter().any(|t| has_asset(p, t, exact)))
            .collect()
    }

    pub fn get_by_id(&self, id: u64) -> Option<&CanonicalRecord> {
        self.pools.iter().find(|p| p.id == id)
    }

    /// Substring search over raw denoms and, for IBC denoms, over their resolved base denom.
    pub async fn search_by_base_denom(
        &self,
        term: &str,
        resolver: &mut DenomResolver,
    ) -> Vec<&CanonicalRecord> {
        let term = term.to_lowercase();
        let mut results = Vec::new();

        for pool in &self.pools {
            for denom in pool.denoms() {
                if denom.to_lowercase().contains(&term) {
                    results.push(pool);
                    break;
                }
                if denom.starts_with(IBC_PREFIX) {
                    let decoded = resolver.decode(denom).await;
                    if decoded
                        .base_denom()
                        .map_or(false, |base| base.to_lowercase().contains(&term))
                    {
                        results.push(pool);
                        break;
                    }
                }
            }
        }
        results
    }
}

fn lowercase_all<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    terms.iter().map(|t| t.as_ref().to_lowercase()).collect()
}

// `term` is already lower-cased
fn has_asset(pool: &CanonicalRecord, term: &str, exact: bool) -> bool {
    pool.denoms().any(|denom| {
        let denom = denom.to_lowercase();
        if exact {
            denom == term
        } else {
            denom.contains(term)
        }
    })
}

#[derive(Debug, Clone)]
pub struct DecoratedAsset {
    pub slot: u32,
    pub decoded: DecodedDenom,
    pub display: String,
    /// Human-scaled liquidity (`1.50K`), when the pool carries liquidity for this slot
    pub amount: Option<String>,
    pub usd: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct DecoratedPool {
    pub record: CanonicalRecord,
    pub assets: Vec<DecoratedAsset>,
    /// Sum over slots with a resolvable price; `None` when no slot could be priced
    pub tvl: Option<Decimal>,
}

pub async fn decorate(
    record: &CanonicalRecord,
    resolver: &mut DenomResolver,
    mut prices: Option<&mut PriceEnricher>,
) -> DecoratedPool {
    if let (Some(prices), Some(liquidity)) = (prices.as_deref_mut(), record.liquidity.as_ref()) {
        prices
            .prefetch(liquidity.values().map(|l| l.denom.as_str()))
            .await;
    }

    let mut assets = Vec::with_capacity(record.assets.len());
    let mut tvl: Option<Decimal> = None;

    for (slot, denom) in &record.assets {
        let decoded = resolver.decode(denom).await;
        let display = format_denom(&decoded);
        let liquidity = record.liquidity_for(*slot);
        let amount = liquidity.map(|l| format_amount(&l.amount, &l.denom));

        let mut usd = None;
        if let (Some(prices), Some(l)) = (prices.as_deref_mut(), liquidity) {
            usd = prices.usd_value(&l.denom, &l.amount).await;
        }
        if let Some(value) = usd {
            tvl = Some(tvl.unwrap_or_default().saturating_add(value));
        }

        assets.push(DecoratedAsset {
            slot: *slot,
            decoded,
            display,
            amount,
            usd,
        });
    }

    DecoratedPool {
        record: record.clone(),
        assets,
        tvl,
    }
}

/// Plain listing: raw denoms with scaled liquidity.
pub fn format_pool(pool: &CanonicalRecord) -> String {
    let mut lines = vec![
        format!("Pool #{} ({})", pool.id, pool.pool_type),
        format!("  Address: {}", pool.address),
        "  Assets:".to_string(),
    ];
    for (slot, denom) in &pool.assets {
        let liquidity = pool
            .liquidity_for(*slot)
            .map(|l| format!(" [{}]", format_amount(&l.amount, &l.denom)))
            .unwrap_or_default();
        lines.push(format!("    {}: {}{}", slot, denom, liquidity));
    }
    push_fee(&mut lines, pool);
    lines.join("\n")
}

/// Decorated listing: display names, scaled liquidity, USD values and TVL.
pub fn format_decorated(pool: &DecoratedPool) -> String {
    let record = &pool.record;
    let mut lines = vec![
        format!("Pool #{} ({})", record.id, record.pool_type),
        format!("  Address: {}", record.address),
        "  Assets:".to_string(),
    ];
    for asset in &pool.assets {
        let mut line = format!("    {}: {}", asset.slot, asset.display);
        if let Some(amount) = &asset.amount {
            line.push_str(&format!(" [{}]", amount));
        }
        if let Some(usd) = asset.usd {
            line.push_str(&format!(" ({})", format_usd(usd)));
        }
        lines.push(line);
    }
    push_fee(&mut lines, record);
    if let Some(tvl) = pool.tvl {
        lines.push(format!("  TVL: {}", format_usd(tvl)));
    }
    lines.join("\n")
}

fn push_fee(lines: &mut Vec<String>, pool: &CanonicalRecord) {
    if pool.fees.swap_fee.is_empty() {
        return;
    }
    if let Some(pct) = format_fee_percent(&pool.fees.swap_fee) {
        lines.push(format!("  Swap Fee: {}", pct));
    }
}
