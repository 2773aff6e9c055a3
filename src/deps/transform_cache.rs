//! Persistent transform payload cache
//!
//! Content-addressed entries keyed by the hex SHA-256 the transform engine
//! computes over `(pointer, transform, group, options hash)`. Entries live as
//! `<dir>/<aa>/<rest>.json` with a small `{key, value, expiresAt?}` payload.
//! Expired entries are evicted on the first read after expiry; corrupt
//! entries are evicted silently.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transform::PayloadCache;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    key: String,
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// Disk-backed payload cache with optional TTL.
pub struct TransformCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl TransformCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: None,
        }
    }

    /// Entries written after this call expire `ttl` after their write time.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `aa/bbbb....json` sharding under the cache directory.
    fn entry_path(&self, key: &str) -> PathBuf {
        if key.len() > 2 {
            self.dir.join(&key[..2]).join(format!("{}.json", &key[2..]))
        } else {
            self.dir.join(format!("{key}.json"))
        }
    }

    /// Number of entries currently on disk. Test and introspection helper.
    pub fn entry_count(&self) -> usize {
        walkdir::WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .count()
    }
}

impl PayloadCache for TransformCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let bytes = std::fs::read(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                // Corrupt entries are evicted silently.
                tracing::warn!(key, error = %err, "evicting corrupt transform cache entry");
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        if let Some(expires_at) = entry.expires_at {
            if Utc::now().timestamp_millis() >= expires_at {
                let _ = std::fs::remove_file(&path);
                return None;
            }
        }

        Some(entry.value)
    }

    fn put(&self, key: &str, value: &Value) {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }

        let entry = CacheEntry {
            key: key.to_string(),
            value: value.clone(),
            expires_at: self
                .ttl
                .map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64),
        };
        if let Ok(mut payload) = serde_json::to_string(&entry) {
            payload.push('\n');
            let _ = std::fs::write(&path, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = TransformCache::new(dir.path());
        let key = "ab".to_string() + &"cd".repeat(31);

        cache.put(&key, &json!({"css": "#336699"}));
        assert_eq!(cache.get(&key), Some(json!({"css": "#336699"})));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let dir = TempDir::new().unwrap();
        let cache = TransformCache::new(dir.path()).with_ttl(Duration::from_millis(10));
        let key = "ef".to_string() + &"01".repeat(31);

        cache.put(&key, &json!("payload"));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get(&key), None);
        // The on-disk entry is gone after the expired read.
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn unexpired_ttl_entry_survives() {
        let dir = TempDir::new().unwrap();
        let cache = TransformCache::new(dir.path()).with_ttl(Duration::from_secs(3600));
        let key = "0102".to_string();

        cache.put(&key, &json!(1));
        assert_eq!(cache.get(&key), Some(json!(1)));
    }

    #[test]
    fn corrupt_entry_is_evicted_silently() {
        let dir = TempDir::new().unwrap();
        let cache = TransformCache::new(dir.path());
        let key = "aa".to_string() + &"bb".repeat(31);

        let path = cache.entry_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{definitely not json").unwrap();

        assert_eq!(cache.get(&key), None);
        assert!(!path.exists());
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = TransformCache::new(dir.path());
        assert_eq!(cache.get("0000"), None);
    }
}
