//! Shared data types for the indexer.

/// Canonical pool record and its parts
pub mod records;
/// Error taxonomy for upstream fetches
pub mod errors;

pub use errors::FetchError;
pub use records::{CanonicalRecord, Fees, LiquidityEntry, PoolType, SlotMap};
