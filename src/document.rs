//! DTIF document loading and the process-scoped document cache
//!
//! The cache is shared by the resolver (source documents and external alias
//! targets) and the watch driver (reuse across rebuilds). Entries are keyed
//! by URI and content-addressed: a lookup re-reads the bytes, hashes them,
//! and reuses the parsed document only while the hash still matches, so a
//! rebuild after an on-disk edit reparses exactly the changed documents.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::canonical_bytes;

/// Cache status recorded on each resolved source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Miss,
    Hit,
    Stale,
}

/// A parsed DTIF document.
#[derive(Debug, Clone)]
pub struct DtifDocument {
    pub uri: String,

    /// Parsed JSON content.
    pub content: Value,

    /// Hex SHA-256 of the source bytes (canonical bytes for inline and
    /// virtual documents).
    pub content_hash: String,
}

/// Port for reading document bytes; the engine ships a filesystem loader and
/// tests substitute in-memory ones.
pub trait DocumentLoader: Send + Sync {
    /// Read the document at `uri` as UTF-8 text.
    fn load(&self, uri: &str) -> Result<String>;
}

/// Loads documents from paths relative to the configuration directory.
pub struct FsDocumentLoader {
    root: PathBuf,
}

impl FsDocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl DocumentLoader for FsDocumentLoader {
    fn load(&self, uri: &str) -> Result<String> {
        let path = self.resolve(uri);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read document '{}'", path.display()))?;
        String::from_utf8(bytes)
            .with_context(|| format!("document '{}' is not valid UTF-8", path.display()))
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Process-scoped, weakly-consistent document cache.
pub struct DocumentCache {
    entries: DashMap<String, Arc<DtifDocument>, ahash::RandomState>,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Load `uri` through `loader`, reusing the parsed document when its
    /// bytes are unchanged. Returns the document and the cache status.
    pub fn load(
        &self,
        uri: &str,
        loader: &dyn DocumentLoader,
    ) -> Result<(Arc<DtifDocument>, CacheStatus)> {
        let text = loader.load(uri)?;
        let content_hash = hash_bytes(text.as_bytes());

        if let Some(existing) = self.entries.get(uri) {
            if existing.content_hash == content_hash {
                return Ok((existing.clone(), CacheStatus::Hit));
            }
        }

        let status = if self.entries.contains_key(uri) {
            CacheStatus::Stale
        } else {
            CacheStatus::Miss
        };

        let content: Value = serde_json::from_str(&text)
            .with_context(|| format!("document '{uri}' is not valid JSON"))?;
        let document = Arc::new(DtifDocument {
            uri: uri.to_string(),
            content,
            content_hash,
        });
        self.entries.insert(uri.to_string(), document.clone());
        Ok((document, status))
    }

    /// Insert an already-parsed document (inline or virtual source).
    pub fn insert_parsed(&self, uri: &str, content: Value) -> (Arc<DtifDocument>, CacheStatus) {
        let content_hash = hash_bytes(&canonical_bytes(&content));

        if let Some(existing) = self.entries.get(uri) {
            if existing.content_hash == content_hash {
                return (existing.clone(), CacheStatus::Hit);
            }
        }

        let status = if self.entries.contains_key(uri) {
            CacheStatus::Stale
        } else {
            CacheStatus::Miss
        };

        let document = Arc::new(DtifDocument {
            uri: uri.to_string(),
            content,
            content_hash,
        });
        self.entries.insert(uri.to_string(), document.clone());
        (document, status)
    }

    /// Cached document, if present. Used for external alias targets that
    /// were already loaded this run.
    pub fn get(&self, uri: &str) -> Option<Arc<DtifDocument>> {
        self.entries.get(uri).map(|entry| entry.clone())
    }

    pub fn invalidate(&self, uri: &str) {
        self.entries.remove(uri);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory loader with mutable contents for staleness tests.
    struct MemoryLoader {
        files: Mutex<HashMap<String, String>>,
    }

    impl MemoryLoader {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
            }
        }

        fn put(&self, uri: &str, text: &str) {
            self.files.lock().unwrap().insert(uri.into(), text.into());
        }
    }

    impl DocumentLoader for MemoryLoader {
        fn load(&self, uri: &str) -> Result<String> {
            self.files
                .lock()
                .unwrap()
                .get(uri)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such document: {uri}"))
        }
    }

    #[test]
    fn miss_then_hit_then_stale() {
        let cache = DocumentCache::new();
        let loader = MemoryLoader::new();
        loader.put("a.json", r#"{"x": 1}"#);

        let (_, status) = cache.load("a.json", &loader).unwrap();
        assert_eq!(status, CacheStatus::Miss);

        let (_, status) = cache.load("a.json", &loader).unwrap();
        assert_eq!(status, CacheStatus::Hit);

        loader.put("a.json", r#"{"x": 2}"#);
        let (doc, status) = cache.load("a.json", &loader).unwrap();
        assert_eq!(status, CacheStatus::Stale);
        assert_eq!(doc.content, json!({"x": 2}));
    }

    #[test]
    fn parse_failure_is_attributed_to_the_uri() {
        let cache = DocumentCache::new();
        let loader = MemoryLoader::new();
        loader.put("broken.json", "{not json");

        let err = cache.load("broken.json", &loader).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn inline_documents_share_the_cache() {
        let cache = DocumentCache::new();
        let (_, status) = cache.insert_parsed("inline:base", json!({"a": 1}));
        assert_eq!(status, CacheStatus::Miss);

        let (_, status) = cache.insert_parsed("inline:base", json!({"a": 1}));
        assert_eq!(status, CacheStatus::Hit);

        let (_, status) = cache.insert_parsed("inline:base", json!({"a": 2}));
        assert_eq!(status, CacheStatus::Stale);
    }

    #[test]
    fn fs_loader_reads_relative_to_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("tokens.json"), r#"{"ok": true}"#).unwrap();

        let loader = FsDocumentLoader::new(dir.path());
        let cache = DocumentCache::new();
        let (doc, _) = cache.load("tokens.json", &loader).unwrap();
        assert_eq!(doc.content, json!({"ok": true}));
    }
}
