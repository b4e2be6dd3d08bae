//! # Sled Cache Storage Backend
//!
//! ## Purpose
//! Durable cache storage using an embedded sled database. Each named cache
//! store is a sled tree named by its generation identifier; stored responses
//! are bincode-serialized and optionally gzip-compressed.
//!
//! ## Input/Output Specification
//! - **Input**: Store names, request keys, response payloads
//! - **Output**: Durable request→response entries surviving restarts
//! - **Storage**: One sled `Db`, one tree per cache generation

use crate::config::StorageConfig;
use crate::errors::{AgentError, Result};
use crate::storage::{CacheStorage, CacheStore};
use crate::{CachedResponse, RequestKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Name sled reserves for its default tree; never a cache store
const SLED_DEFAULT_TREE: &str = "__sled__default";

/// Payload markers distinguishing raw from gzip-compressed entries
const PAYLOAD_RAW: u8 = 0;
const PAYLOAD_GZIP: u8 = 1;

/// Durable cache storage backed by a sled database
pub struct SledCacheStorage {
    db: sled::Db,
    enable_compression: bool,
}

impl SledCacheStorage {
    /// Open (creating if absent) the database at the configured path
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(&config.db_path).map_err(|e| AgentError::StoreUnavailable {
            name: config.db_path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Cache storage opened at {:?} ({} existing stores)",
            config.db_path,
            db.tree_names()
                .iter()
                .filter(|n| n.as_ref() != SLED_DEFAULT_TREE.as_bytes())
                .count()
        );

        Ok(Self {
            db,
            enable_compression: config.enable_compression,
        })
    }
}

#[async_trait]
impl CacheStorage for SledCacheStorage {
    async fn open_store(&self, name: &str) -> Result<Arc<dyn CacheStore>> {
        let tree = self
            .db
            .open_tree(name)
            .map_err(|e| AgentError::StoreUnavailable {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Arc::new(SledCacheStore {
            name: name.to_string(),
            tree,
            enable_compression: self.enable_compression,
        }))
    }

    async fn list_stores(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for raw in self.db.tree_names() {
            if raw.as_ref() == SLED_DEFAULT_TREE.as_bytes() {
                continue;
            }
            let name = String::from_utf8(raw.to_vec()).map_err(|e| AgentError::Internal {
                message: format!("non-UTF-8 store name in database: {}", e),
            })?;
            names.push(name);
        }
        Ok(names)
    }

    async fn delete_store(&self, name: &str) -> Result<bool> {
        let existed = self.db.drop_tree(name)?;
        if existed {
            self.db.flush_async().await?;
        }
        Ok(existed)
    }
}

/// One sled tree holding a single cache generation's entries
pub struct SledCacheStore {
    name: String,
    tree: sled::Tree,
    enable_compression: bool,
}

impl SledCacheStore {
    fn encode(&self, response: &CachedResponse) -> Result<Vec<u8>> {
        let serialized = bincode::serialize(response)?;

        if self.enable_compression {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&serialized)?;
            let mut payload = vec![PAYLOAD_GZIP];
            payload.extend(encoder.finish()?);
            Ok(payload)
        } else {
            let mut payload = vec![PAYLOAD_RAW];
            payload.extend(serialized);
            Ok(payload)
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<CachedResponse> {
        // Marker byte keeps entries readable across compression-setting changes
        let (marker, rest) = payload.split_first().ok_or_else(|| AgentError::Internal {
            message: "empty payload in cache store".to_string(),
        })?;

        let serialized = match *marker {
            PAYLOAD_RAW => rest.to_vec(),
            PAYLOAD_GZIP => {
                use std::io::Read;
                let mut decoder = flate2::read::GzDecoder::new(rest);
                let mut decompressed = Vec::new();
                decoder.read_to_end(&mut decompressed)?;
                decompressed
            }
            other => {
                return Err(AgentError::Internal {
                    message: format!("unknown payload marker {} in cache store", other),
                })
            }
        };

        Ok(bincode::deserialize(&serialized)?)
    }
}

#[async_trait]
impl CacheStore for SledCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &RequestKey, response: &CachedResponse) -> Result<()> {
        let payload = self.encode(response)?;
        self.tree.insert(key.storage_key(), payload)?;
        self.tree.flush_async().await?;

        tracing::debug!(
            "Stored {} in '{}' ({} bytes)",
            key,
            self.name,
            response.body.len()
        );
        Ok(())
    }

    async fn lookup(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
        match self.tree.get(key.storage_key())? {
            Some(payload) => Ok(Some(self.decode(&payload)?)),
            None => Ok(None),
        }
    }

    async fn contains(&self, key: &RequestKey) -> Result<bool> {
        Ok(self.tree.contains_key(key.storage_key())?)
    }

    async fn entry_count(&self) -> Result<usize> {
        Ok(self.tree.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_response(url: &str, body: &str) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.as_bytes().to_vec(),
            fetched_at: Utc::now(),
        }
    }

    fn temp_storage(enable_compression: bool) -> (tempfile::TempDir, SledCacheStorage) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            db_path: dir.path().join("cache.db"),
            enable_compression,
        };
        let storage = SledCacheStorage::open(&config).unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let (_dir, storage) = temp_storage(true);
        let store = storage.open_store("cfop-cache-v1").await.unwrap();

        let key = RequestKey::get("/static/index.html");
        let response = sample_response("/static/index.html", "<html></html>");
        store.put(&key, &response).await.unwrap();

        let found = store.lookup(&key).await.unwrap().unwrap();
        assert_eq!(found, response);
        assert!(store.contains(&key).await.unwrap());
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_uncompressed_entries_still_readable() {
        let (_dir, storage) = temp_storage(false);
        let store = storage.open_store("cfop-cache-v1").await.unwrap();

        let key = RequestKey::get("/");
        store.put(&key, &sample_response("/", "hello")).await.unwrap();
        let found = store.lookup(&key).await.unwrap().unwrap();
        assert_eq!(found.body_text(), "hello");
    }

    #[tokio::test]
    async fn test_list_and_delete_stores() {
        let (_dir, storage) = temp_storage(true);
        storage.open_store("cfop-cache-v0").await.unwrap();
        storage.open_store("cfop-cache-v1").await.unwrap();

        let mut names = storage.list_stores().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["cfop-cache-v0", "cfop-cache-v1"]);

        assert!(storage.delete_store("cfop-cache-v0").await.unwrap());
        assert!(!storage.delete_store("cfop-cache-v0").await.unwrap());

        let names = storage.list_stores().await.unwrap();
        assert_eq!(names, vec!["cfop-cache-v1"]);
    }

    #[tokio::test]
    async fn test_lookup_miss_returns_none() {
        let (_dir, storage) = temp_storage(true);
        let store = storage.open_store("cfop-cache-v1").await.unwrap();
        let missing = store.lookup(&RequestKey::get("/nope")).await.unwrap();
        assert!(missing.is_none());
    }
}
