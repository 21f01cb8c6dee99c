use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ordered slot -> value mapping. Slots are 1-based and keep the order of the raw pool body.
pub type SlotMap<T> = IndexMap<u32, T>;

/// Canonical classification of a pool schema variant.
///
/// Deserialization is tolerant: older corpora wrote `concentratedliquidity`, and any tag this
/// version does not know maps to `Unknown` instead of failing the whole corpus load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    /// Concentrated liquidity (`/osmosis.concentratedliquidity.v1beta1.Pool`)
    #[serde(alias = "concentratedliquidity")]
    Concentrated,
    /// Stableswap pools from `gamm.poolmodels.stableswap`
    Stableswap,
    /// CosmWasm contract pools (`/osmosis.cosmwasmpool.v1beta1.CosmWasmPool`)
    Cosmwasm,
    /// Classic weighted/balancer pools (`/osmosis.gamm.v1beta1.Pool`)
    Gamm,
    #[serde(other)]
    Unknown,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Concentrated => "concentrated",
            PoolType::Stableswap => "stableswap",
            PoolType::Cosmwasm => "cosmwasm",
            PoolType::Gamm => "gamm",
            PoolType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fee parameters as reported upstream. Empty strings mean "not applicable".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    #[serde(default)]
    pub swap_fee: String,
    #[serde(default)]
    pub exit_fee: String,
}

/// One holding of a pool: the denom and its raw integer amount (base units, as a string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityEntry {
    pub denom: String,
    pub amount: String,
}

/// Normalized pool record, persisted once per pool id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(deserialize_with = "deserialize_pool_id")]
    pub id: u64,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    #[serde(default)]
    pub assets: SlotMap<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<SlotMap<LiquidityEntry>>,
    #[serde(default)]
    pub fees: Fees,
}

impl CanonicalRecord {
    /// Asset denoms in slot order.
    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.assets.values().map(String::as_str)
    }

    pub fn liquidity_for(&self, slot: u32) -> Option<&LiquidityEntry> {
        self.liquidity.as_ref().and_then(|l| l.get(&slot))
    }
}

// Pool ids arrive as JSON strings from the LCD API and as numbers from this crate.
fn deserialize_pool_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Num(n) => Ok(n),
        RawId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
