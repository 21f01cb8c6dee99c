// src/utils.rs
// JSON file helpers shared by the corpus, the skip list and the on-disk caches.

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Outcome of reading a persisted JSON document.
#[derive(Debug)]
pub enum Loaded<T> {
    Parsed(T),
    Missing,
    /// The file existed but could not be parsed; callers reset to an empty value.
    Corrupt,
}

impl<T: Default> Loaded<T> {
    pub fn or_default(self) -> T {
        match self {
            Loaded::Parsed(v) => v,
            Loaded::Missing | Loaded::Corrupt => T::default(),
        }
    }
}

/// Reads and parses `path`.
///
/// Only unparsable content is [`Loaded::Corrupt`]. Any read failure other than a missing file
/// is an error, so a caller never rewrites a document it could not read.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => Ok(Loaded::Parsed(v)),
        Err(e) => {
            warn!("Failed to parse {}: {} (resetting)", path.display(), e);
            Ok(Loaded::Corrupt)
        }
    }
}

/// [`read_json`] for caches: every failure starts from an empty value.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(loaded) => loaded.or_default(),
        Err(e) => {
            warn!("{:#}, starting with an empty cache", e);
            T::default()
        }
    }
}

/// Pretty-prints `value` to a sibling temp file and renames it over `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Milliseconds since the Unix epoch, the timestamp unit of every cache file.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        assert!(matches!(read_json::<HashMap<String, u32>>(&path), Ok(Loaded::Missing)));

        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(read_json::<HashMap<String, u32>>(&path), Ok(Loaded::Corrupt)));
        assert!(read_json_or_default::<HashMap<String, u32>>(&path).is_empty());
    }

    #[test]
    fn test_unreadable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::create_dir(&path).unwrap();
        assert!(read_json::<HashMap<String, u32>>(&path).is_err());
        assert!(read_json_or_default::<HashMap<String, u32>>(&path).is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut map = HashMap::new();
        map.insert("a".to_string(), 1u32);
        write_json(&path, &map).unwrap();
        assert_eq!(read_json_or_default::<HashMap<String, u32>>(&path), map);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
