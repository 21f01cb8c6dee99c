//! Durable, resumable corpus of canonical pool records (`pools.json`).
//!
//! Every append is a full read-modify-write of the document. That is O(corpus) per record and
//! accepted: a single ingester writes at most one pool per request round-trip, and the file is
//! the same `{pools: [...]}` document the query side reads.
//!
//! Only one ingester process may use a data directory at a time; nothing here detects a second
//! writer.

use crate::types::CanonicalRecord;
use crate::utils::{read_json, write_json, Loaded};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const POOLS_FILE: &str = "pools.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolCorpus {
    #[serde(default)]
    pub pools: Vec<CanonicalRecord>,
}

impl PoolCorpus {
    /// Next id to ingest: last record's id + 1, or 1 for an empty corpus.
    pub fn resume_id(&self) -> u64 {
        self.pools.last().map(|p| p.id + 1).unwrap_or(1)
    }
}

#[derive(Debug, Clone)]
pub struct PoolStore {
    data_dir: PathBuf,
    path: PathBuf,
}

impl PoolStore {
    /// Opens the store under `data_dir`, creating the directory if needed.
    ///
    /// Failure here is a startup error: the caller must not enter the ingestion loop.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data directory {}", data_dir.display()))?;
            info!("Created data directory at {}", data_dir.display());
        }
        let path = data_dir.join(POOLS_FILE);
        Ok(Self { data_dir, path })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the corpus. A missing file yields an empty corpus; a corrupt one is reset to empty
    /// with a warning. A file that exists but cannot be read is an error.
    pub fn load(&self) -> Result<PoolCorpus> {
        let corpus = match read_json::<PoolCorpus>(&self.path)? {
            Loaded::Parsed(corpus) => corpus,
            Loaded::Missing => {
                info!("{} not found, starting with an empty corpus", self.path.display());
                PoolCorpus::default()
            }
            Loaded::Corrupt => {
                warn!("Corpus at {} is corrupt, starting over", self.path.display());
                PoolCorpus::default()
            }
        };
        Ok(corpus)
    }

    pub fn save(&self, corpus: &PoolCorpus) -> Result<()> {
        write_json(&self.path, corpus)
    }

    /// Appends `record` to the end of the corpus.
    ///
    /// Records must arrive in increasing id order; an id at or below the current tail is
    /// routed through [`PoolStore::insert_sorted`] instead so the ordering invariant holds.
    pub fn append(&self, record: &CanonicalRecord) -> Result<()> {
        let mut corpus = self.load()?;
        if corpus.pools.last().map_or(false, |last| last.id >= record.id) {
            warn!(
                "Pool {} is not past the corpus tail, inserting in order",
                record.id
            );
            insert_in_order(&mut corpus, record.clone());
        } else {
            corpus.pools.push(record.clone());
        }
        self.save(&corpus)
    }

    /// Inserts a backfilled record at its sorted position, replacing an existing record with the
    /// same id.
    pub fn insert_sorted(&self, record: &CanonicalRecord) -> Result<()> {
        let mut corpus = self.load()?;
        insert_in_order(&mut corpus, record.clone());
        self.save(&corpus)
    }

    pub fn resume_id(&self) -> Result<u64> {
        Ok(self.load()?.resume_id())
    }
}

fn insert_in_order(corpus: &mut PoolCorpus, record: CanonicalRecord) {
    match corpus.pools.binary_search_by_key(&record.id, |p| p.id) {
        Ok(pos) => corpus.pools[pos] = record,
        Err(pos) => corpus.pools.insert(pos, record),
    }
}
