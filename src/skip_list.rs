// Skip list - pool ids abandoned after exhausting retries, kept for a later backfill pass.

use crate::utils::{read_json, write_json};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const SKIPPED_FILE: &str = "skipped.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SkippedDocument {
    #[serde(default)]
    skipped: BTreeSet<u64>,
}

/// Persisted set of abandoned pool ids (`skipped.json`).
///
/// Loaded once and rewritten on every change; ids are kept sorted so backfill walks them in
/// corpus order.
#[derive(Debug)]
pub struct SkipList {
    path: PathBuf,
    ids: BTreeSet<u64>,
}

impl SkipList {
    /// Fails when `skipped.json` exists but cannot be read; a corrupt document starts empty.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SKIPPED_FILE);
        let ids = read_json::<SkippedDocument>(&path)?.or_default().skipped;
        Ok(Self { path, ids })
    }

    pub fn record(&mut self, pool_id: u64) -> Result<()> {
        if self.ids.insert(pool_id) {
            self.persist()?;
        }
        Ok(())
    }

    pub fn resolve(&mut self, pool_id: u64) -> Result<()> {
        if self.ids.remove(&pool_id) {
            info!("Pool {} recovered, removed from skip list", pool_id);
            self.persist()?;
        }
        Ok(())
    }

    pub fn contains(&self, pool_id: u64) -> bool {
        self.ids.contains(&pool_id)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn persist(&self) -> Result<()> {
        write_json(
            &self.path,
            &SkippedDocument {
                skipped: self.ids.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_resolve_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut list = SkipList::open(dir.path()).unwrap();
        list.record(9).unwrap();
        list.record(3).unwrap();
        list.record(9).unwrap();

        let reopened = SkipList::open(dir.path()).unwrap();
        assert_eq!(reopened.ids(), vec![3, 9]);

        list.resolve(3).unwrap();
        assert!(!SkipList::open(dir.path()).unwrap().contains(3));
        assert_eq!(list.len(), 1);
    }
}
