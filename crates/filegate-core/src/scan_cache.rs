//! Detection result cache.
//!
//! Persists analysis results to `<cache_dir>/detection-cache.json` so a host
//! can skip re-reading files that have not changed. Key = SHA256 of the
//! canonical path, size and mtime; entries expire after the configured TTL.
//! Only `FileGate::authorize_read_cached` consults it; the plain
//! `authorize_read` path always re-reads the file.

use crate::config::CacheConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const CACHE_FILENAME: &str = "detection-cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedEntry {
    value: serde_json::Value,
    timestamp: u64,
}

#[derive(Debug)]
pub struct DetectionCache {
    path: PathBuf,
    ttl_secs: u64,
    entries: HashMap<String, CachedEntry>,
    dirty: bool,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl DetectionCache {
    pub fn open(config: &CacheConfig) -> Self {
        Self::in_dir(&config.cache_dir, config.ttl_secs)
    }

    /// Load `<dir>/detection-cache.json`; a missing or corrupt file starts empty.
    pub fn in_dir(dir: &Path, ttl_secs: u64) -> Self {
        let path = dir.join(CACHE_FILENAME);
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            ttl_secs,
            entries,
            dirty: false,
        }
    }

    /// Cache key for a file's current state, or `None` if it cannot be
    /// stat'd. A symlink is fingerprinted as the link, not its target.
    pub fn fingerprint(path: &Path) -> Option<String> {
        let meta = fs::symlink_metadata(path).ok()?;
        Some(Self::fingerprint_with(path, &meta))
    }

    /// Cache key from metadata already taken, e.g. from an open handle.
    pub fn fingerprint_with(path: &Path, meta: &fs::Metadata) -> String {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        hasher.update(meta.len().to_le_bytes());
        hasher.update(mtime.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if now_secs().saturating_sub(entry.timestamp) >= self.ttl_secs {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key.to_string(),
                    CachedEntry {
                        value,
                        timestamp: now_secs(),
                    },
                );
                self.dirty = true;
            }
            Err(e) => tracing::warn!(err = %e, "detection result not cacheable"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict expired entries and write the cache file if anything changed.
    pub fn save(&mut self) -> Result<()> {
        let now = now_secs();
        let ttl = self.ttl_secs;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_sub(e.timestamp) < ttl);
        if !self.dirty && before == self.entries.len() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("write cache {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Verdict {
        tag: String,
        confidence: f32,
    }

    #[test]
    fn test_fingerprint_tracks_content_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.bin");
        fs::write(&file, b"one").unwrap();
        let first = DetectionCache::fingerprint(&file).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, DetectionCache::fingerprint(&file).unwrap());

        fs::write(&file, b"longer content").unwrap();
        assert_ne!(first, DetectionCache::fingerprint(&file).unwrap());
        assert!(DetectionCache::fingerprint(&tmp.path().join("missing")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_fingerprint_does_not_follow_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(tmp.path().join("missing"), &link).unwrap();
        assert!(DetectionCache::fingerprint(&link).is_some());
    }

    #[test]
    fn test_cache_roundtrip_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let verdict = Verdict {
            tag: "PNG".to_string(),
            confidence: 0.9,
        };
        let mut cache = DetectionCache::in_dir(tmp.path(), 300);
        cache.insert("k1", &verdict);
        cache.save().unwrap();

        let reopened = DetectionCache::in_dir(tmp.path(), 300);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get::<Verdict>("k1"), Some(verdict));
        assert_eq!(reopened.get::<Verdict>("k2"), None);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = DetectionCache::in_dir(tmp.path(), 0);
        cache.insert("k", &1u32);
        assert_eq!(cache.get::<u32>("k"), None);
        cache.save().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CACHE_FILENAME), "{not json").unwrap();
        assert!(DetectionCache::in_dir(tmp.path(), 300).is_empty());
    }
}
