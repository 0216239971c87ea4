//! Inventory cache - extracted text persisted between runs
//!
//! Keyed by [`FileKey`] and validated by exact modification timestamp, so an
//! unchanged file skips fetch and extraction on the next run. The cache is
//! read-only while a pass runs; the pipeline builds the next one from the
//! pass outcome and it is written back in one atomic replace.

use crate::error::Result;
use crate::types::FileKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Cache format version - bump when format changes
const CACHE_VERSION: u32 = 1;

/// Cached extraction result for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub modified: DateTime<Utc>,
    pub text: String,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
    entries: HashMap<FileKey, CacheEntry>,
}

/// On-disk layout. JSON object keys must be strings, so entries are a list.
#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: FileKey,
    #[serde(flatten)]
    entry: CacheEntry,
}

impl InventoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing, outdated or unreadable cache is empty.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No inventory cache");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable inventory cache");
                return Ok(Self::new());
            }
        };
        if file.version != CACHE_VERSION {
            warn!(
                path = %path.display(),
                expected = CACHE_VERSION,
                found = file.version,
                "Cache version mismatch, starting empty"
            );
            return Ok(Self::new());
        }

        let entries = file
            .entries
            .into_iter()
            .map(|stored| (stored.key, stored.entry))
            .collect();
        Ok(Self { entries })
    }

    /// Entry for `key`, only if it was cached at exactly `modified`.
    pub fn lookup(&self, key: &FileKey, modified: DateTime<Utc>) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|entry| entry.modified == modified)
    }

    pub fn insert(&mut self, key: FileKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write atomically (temp file + fsync + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Sorted so an unchanged cache rewrites byte-identical.
        let mut entries: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|(key, entry)| StoredEntry {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let encoded = serde_json::to_vec(&CacheFile {
            version: CACHE_VERSION,
            entries,
        })?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        debug!(path = %path.display(), entries = self.len(), "Saved inventory cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(id: &str) -> FileKey {
        FileKey::new(Arc::from("local"), id)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 123_456_789).unwrap()
    }

    fn entry(modified: DateTime<Utc>, text: &str) -> CacheEntry {
        CacheEntry {
            modified,
            text: text.to_string(),
            checksum: Some("abc".to_string()),
        }
    }

    #[test]
    fn test_lookup_requires_exact_timestamp() {
        let mut cache = InventoryCache::new();
        cache.insert(key("/a.pdf"), entry(ts(100), "syllabus"));

        assert_eq!(cache.lookup(&key("/a.pdf"), ts(100)).unwrap().text, "syllabus");
        assert!(cache.lookup(&key("/a.pdf"), ts(101)).is_none());
        assert!(cache.lookup(&key("/b.pdf"), ts(100)).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("inventory.json");

        let mut cache = InventoryCache::new();
        cache.insert(key("/a.pdf"), entry(ts(100), "syllabus"));
        cache.insert(
            FileKey::new(Arc::from("drive:work"), "abc123"),
            entry(ts(200), "evaluation"),
        );
        cache.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = InventoryCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        // Sub-second precision survives the round trip.
        assert!(loaded.lookup(&key("/a.pdf"), ts(100)).is_some());
    }

    #[test]
    fn test_missing_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::load(&dir.path().join("nope.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_version_mismatch_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        fs::write(&path, r#"{"version": 999, "entries": []}"#).unwrap();
        assert!(InventoryCache::load(&path).unwrap().is_empty());

        fs::write(&path, "not json").unwrap();
        assert!(InventoryCache::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");

        let mut cache = InventoryCache::new();
        cache.insert(key("/a.pdf"), entry(ts(1), "old"));
        cache.save(&path).unwrap();

        let mut next = InventoryCache::new();
        next.insert(key("/b.pdf"), entry(ts(2), "new"));
        next.save(&path).unwrap();

        let loaded = InventoryCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.lookup(&key("/b.pdf"), ts(2)).is_some());
    }
}
