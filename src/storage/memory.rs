//! # In-Memory Cache Storage Backend
//!
//! ## Purpose
//! Trait-equivalent cache storage held entirely in memory. Used by the test
//! suite and by the host simulator's dry-run mode, where durable state is
//! unwanted.
//!
//! Deletion semantics mirror the sled backend: dropping a store removes it
//! from the namespace, while any already-open handle keeps its entries alive
//! until the handle itself is dropped.

use crate::errors::Result;
use crate::storage::{CacheStorage, CacheStore};
use crate::{CachedResponse, RequestKey};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory cache storage: a registry of named stores
#[derive(Default)]
pub struct MemoryCacheStorage {
    stores: DashMap<String, Arc<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    entries: DashMap<Vec<u8>, CachedResponse>,
}

impl MemoryCacheStorage {
    /// Create an empty storage namespace
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open_store(&self, name: &str) -> Result<Arc<dyn CacheStore>> {
        let inner = self
            .stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(StoreInner::default()))
            .clone();

        Ok(Arc::new(MemoryCacheStore {
            name: name.to_string(),
            inner,
        }))
    }

    async fn list_stores(&self) -> Result<Vec<String>> {
        Ok(self.stores.iter().map(|e| e.key().clone()).collect())
    }

    async fn delete_store(&self, name: &str) -> Result<bool> {
        Ok(self.stores.remove(name).is_some())
    }
}

/// Handle to one named in-memory store
pub struct MemoryCacheStore {
    name: String,
    inner: Arc<StoreInner>,
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &RequestKey, response: &CachedResponse) -> Result<()> {
        self.inner
            .entries
            .insert(key.storage_key(), response.clone());
        Ok(())
    }

    async fn lookup(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
        Ok(self
            .inner
            .entries
            .get(&key.storage_key())
            .map(|e| e.value().clone()))
    }

    async fn contains(&self, key: &RequestKey) -> Result<bool> {
        Ok(self.inner.entries.contains_key(&key.storage_key()))
    }

    async fn entry_count(&self) -> Result<usize> {
        Ok(self.inner.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_response(body: &str) -> CachedResponse {
        CachedResponse {
            url: "/".to_string(),
            status: 200,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = MemoryCacheStorage::new();
        let a = storage.open_store("cfop-cache-v1").await.unwrap();
        a.put(&RequestKey::get("/"), &sample_response("x"))
            .await
            .unwrap();

        let b = storage.open_store("cfop-cache-v1").await.unwrap();
        assert_eq!(b.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_from_namespace() {
        let storage = MemoryCacheStorage::new();
        storage.open_store("cfop-cache-v0").await.unwrap();
        assert!(storage.delete_store("cfop-cache-v0").await.unwrap());
        assert!(storage.list_stores().await.unwrap().is_empty());
        assert!(!storage.delete_store("cfop-cache-v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_handle_survives_delete() {
        let storage = MemoryCacheStorage::new();
        let handle = storage.open_store("cfop-cache-v0").await.unwrap();
        handle
            .put(&RequestKey::get("/"), &sample_response("old"))
            .await
            .unwrap();

        storage.delete_store("cfop-cache-v0").await.unwrap();

        // Existing handle still reads its entries; new opens see a fresh store
        assert!(handle
            .lookup(&RequestKey::get("/"))
            .await
            .unwrap()
            .is_some());
        let fresh = storage.open_store("cfop-cache-v0").await.unwrap();
        assert_eq!(fresh.entry_count().await.unwrap(), 0);
    }
}
