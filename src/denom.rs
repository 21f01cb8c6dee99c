//! # IBC denom resolution
//!
//! Resolves `ibc/<hash>` denoms to their base denom and transfer path.
//!
//! ## Features
//!
//! - **Permanent cache**: traces are immutable once anchored on chain, so every successful
//!   resolution is written to `denoms.json` and never evicted
//! - **Endpoint fallback**: trace endpoints are tried in order until one answers
//! - **No negative caching**: a hash no endpoint could resolve is remembered only for the life
//!   of the resolver, so one search asks once and the next process asks again
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut resolver = DenomResolver::from_settings(Arc::new(client), &settings);
//! let decoded = resolver.decode("ibc/27394FB0...").await;
//! println!("{}", format_denom(&decoded));
//! ```

use crate::client::TraceSource;
use crate::settings::Settings;
use crate::utils::{read_json_or_default, write_json};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DENOMS_FILE: &str = "denoms.json";
pub const IBC_PREFIX: &str = "ibc/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenomTrace {
    pub base_denom: String,
    pub path: String,
}

/// A denom after resolution. `trace` is `None` for native denoms and for IBC hashes that could
/// not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedDenom {
    pub denom: String,
    pub is_ibc: bool,
    pub trace: Option<DenomTrace>,
}

impl DecodedDenom {
    pub fn native(denom: &str) -> Self {
        Self {
            denom: denom.to_string(),
            is_ibc: false,
            trace: None,
        }
    }

    pub fn base_denom(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.base_denom.as_str())
    }

    pub fn path(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.path.as_str())
    }
}

// Persisted as { "<hash>": { "baseDenom": ..., "path": ... } }
type DenomCache = BTreeMap<String, DenomTrace>;

pub struct DenomResolver {
    source: Arc<dyn TraceSource>,
    endpoints: Vec<String>,
    cache_path: PathBuf,
    cache: DenomCache,
    // unresolved this session, never persisted
    misses: HashSet<String>,
}

impl DenomResolver {
    pub fn new(source: Arc<dyn TraceSource>, endpoints: Vec<String>, data_dir: &Path) -> Self {
        let cache_path = data_dir.join(DENOMS_FILE);
        let cache: DenomCache = read_json_or_default(&cache_path);
        debug!("Loaded {} cached denom traces", cache.len());
        Self {
            source,
            endpoints,
            cache_path,
            cache,
            misses: HashSet::new(),
        }
    }

    pub fn from_settings(source: Arc<dyn TraceSource>, settings: &Settings) -> Self {
        Self::new(
            source,
            settings.endpoints.trace_urls.clone(),
            &settings.storage.data_dir,
        )
    }

    pub fn cached(&self, hash: &str) -> Option<&DenomTrace> {
        self.cache.get(hash)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolves a bare hash (without the `ibc/` prefix).
    pub async fn resolve(&mut self, hash: &str) -> Option<DenomTrace> {
        if let Some(trace) = self.cache.get(hash) {
            return Some(trace.clone());
        }
        if hash.is_empty() || self.misses.contains(hash) {
            return None;
        }

        for endpoint in &self.endpoints {
            match self.source.fetch_denom_trace(endpoint, hash).await {
                Ok(trace) => {
                    info!("Resolved ibc/{} -> {}", hash, trace.base_denom);
                    self.cache.insert(hash.to_string(), trace.clone());
                    if let Err(e) = write_json(&self.cache_path, &self.cache) {
                        warn!("Failed to persist denom cache: {:#}", e);
                    }
                    return Some(trace);
                }
                Err(e) => {
                    debug!("Trace lookup for {} failed on {}: {}", hash, endpoint, e);
                }
            }
        }

        warn!("Could not resolve ibc/{} on any trace endpoint", hash);
        self.misses.insert(hash.to_string());
        None
    }

    pub async fn decode(&mut self, denom: &str) -> DecodedDenom {
        let Some(hash) = denom.strip_prefix(IBC_PREFIX) else {
            return DecodedDenom::native(denom);
        };
        let trace = self.resolve(hash).await;
        DecodedDenom {
            denom: denom.to_string(),
            is_ibc: true,
            trace,
        }
    }

    /// Decodes every denom in `denoms`, keyed by the input denom in input order.
    pub async fn decode_multiple<S: AsRef<str>>(
        &mut self,
        denoms: &[S],
    ) -> IndexMap<String, DecodedDenom> {
        let mut decoded = IndexMap::with_capacity(denoms.len());
        for denom in denoms {
            let denom = denom.as_ref();
            if decoded.contains_key(denom) {
                continue;
            }
            let value = self.decode(denom).await;
            decoded.insert(denom.to_string(), value);
        }
        decoded
    }
}

/// Channels of an IBC path: the segment after every `transfer` port, walking port/channel pairs.
pub fn parse_ibc_path(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').collect();
    parts
        .chunks(2)
        .filter_map(|pair| match pair {
            ["transfer", channel] if !channel.is_empty() => Some(channel.to_string()),
            _ => None,
        })
        .collect()
}

/// Human-readable form: `base (channel-0)`, `base (channel-1 -> channel-2)`, or the base alone.
/// Native and unresolved denoms render as the raw denom.
pub fn format_denom(decoded: &DecodedDenom) -> String {
    let Some(trace) = decoded.trace.as_ref() else {
        return decoded.denom.clone();
    };
    let channels = parse_ibc_path(&trace.path);
    if channels.is_empty() {
        trace.base_denom.clone()
    } else {
        format!("{} ({})", trace.base_denom, channels.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ATOM_HASH: &str = "27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";

    struct CountingTraces {
        calls: AtomicUsize,
        fail_first_endpoint: bool,
    }

    #[async_trait]
    impl TraceSource for CountingTraces {
        async fn fetch_denom_trace(
            &self,
            endpoint: &str,
            hash: &str,
        ) -> Result<DenomTrace, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if hash != ATOM_HASH
                || (self.fail_first_endpoint && endpoint == "https://first")
            {
                return Err(FetchError::Status {
                    url: endpoint.to_string(),
                    status: 500,
                });
            }
            Ok(DenomTrace {
                base_denom: "uatom".to_string(),
                path: "transfer/channel-0".to_string(),
            })
        }
    }

    fn make_resolver(
        dir: &Path,
        fail_first_endpoint: bool,
    ) -> (DenomResolver, Arc<CountingTraces>) {
        let source = Arc::new(CountingTraces {
            calls: AtomicUsize::new(0),
            fail_first_endpoint,
        });
        let resolver = DenomResolver::new(
            source.clone(),
            vec!["https://first".to_string(), "https://second".to_string()],
            dir,
        );
        (resolver, source)
    }

    #[test]
    fn test_parse_ibc_path() {
        assert_eq!(parse_ibc_path("transfer/channel-0"), vec!["channel-0"]);
        assert_eq!(
            parse_ibc_path("transfer/channel-1/transfer/channel-2"),
            vec!["channel-1", "channel-2"]
        );
        assert!(parse_ibc_path("").is_empty());
        assert!(parse_ibc_path("transfer").is_empty());
        // channel in the wrong position is not picked up
        assert!(parse_ibc_path("wasm.osmo1/transfer").is_empty());
    }

    #[test]
    fn test_format_denom() {
        let native = DecodedDenom::native("uosmo");
        assert_eq!(format_denom(&native), "uosmo");

        let mut decoded = DecodedDenom {
            denom: format!("ibc/{}", ATOM_HASH),
            is_ibc: true,
            trace: None,
        };
        assert_eq!(format_denom(&decoded), decoded.denom);

        decoded.trace = Some(DenomTrace {
            base_denom: "uatom".to_string(),
            path: "transfer/channel-0".to_string(),
        });
        assert_eq!(format_denom(&decoded), "uatom (channel-0)");

        decoded.trace = Some(DenomTrace {
            base_denom: "uusdc".to_string(),
            path: "transfer/channel-1/transfer/channel-2".to_string(),
        });
        assert_eq!(format_denom(&decoded), "uusdc (channel-1 -> channel-2)");

        decoded.trace = Some(DenomTrace {
            base_denom: "uusdc".to_string(),
            path: String::new(),
        });
        assert_eq!(format_denom(&decoded), "uusdc");
    }

    #[tokio::test]
    async fn test_second_decode_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (mut resolver, source) = make_resolver(dir.path(), false);
        let denom = format!("ibc/{}", ATOM_HASH);

        let first = resolver.decode(&denom).await;
        let second = resolver.decode(&denom).await;
        assert_eq!(first, second);
        assert_eq!(first.base_denom(), Some("uatom"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // survives a restart
        let (mut reopened, source) = make_resolver(dir.path(), false);
        reopened.decode(&denom).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_failing_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (mut resolver, source) = make_resolver(dir.path(), true);
        let trace = resolver.resolve(ATOM_HASH).await.unwrap();
        assert_eq!(trace.path, "transfer/channel-0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_native_and_empty_hash_skip_network() {
        let dir = tempfile::tempdir().unwrap();
        let (mut resolver, source) = make_resolver(dir.path(), false);
        assert!(!resolver.decode("uosmo").await.is_ibc);
        let empty = resolver.decode("ibc/").await;
        assert!(empty.is_ibc);
        assert!(empty.trace.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolved_hash_asked_once_per_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let (mut resolver, source) = make_resolver(dir.path(), false);

        // not hex, still looked up on every endpoint
        let bad = resolver.decode("ibc/not-a-hash").await;
        assert!(bad.is_ibc);
        assert!(bad.trace.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        resolver.decode("ibc/not-a-hash").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cache_len(), 0);

        // a fresh resolver asks again
        let (mut reopened, source) = make_resolver(dir.path(), false);
        reopened.decode("ibc/not-a-hash").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_decode_multiple_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut resolver, source) = make_resolver(dir.path(), false);
        let denom = format!("ibc/{}", ATOM_HASH);
        let decoded = resolver
            .decode_multiple(&[denom.clone(), "uosmo".to_string(), denom.clone()])
            .await;
        assert_eq!(decoded.len(), 2);
        assert!(decoded["uosmo"].trace.is_none());
        assert_eq!(decoded[&denom].base_denom(), Some("uatom"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
