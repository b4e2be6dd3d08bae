//! # Cache Storage Module
//!
//! ## Purpose
//! Named cache stores behind injectable traits: the agent owns one "current"
//! store (named by the cache generation identifier) and reclaims all others
//! during activation. Backends: durable sled storage and an in-memory
//! implementation for tests and dry runs.
//!
//! ## Input/Output Specification
//! - **Input**: Store names (generation identifiers), request keys, responses
//! - **Output**: Durable or in-memory request→response mappings
//! - **Guarantees**: Atomic per-key reads and writes provided by the backend
//!
//! ## Key Features
//! - Open/list/delete named stores (the cache namespace)
//! - Per-store put/lookup keyed by method + URL
//! - Optional gzip compression of stored payloads (sled backend)

pub mod memory;
pub mod sled_store;

pub use memory::MemoryCacheStorage;
pub use sled_store::SledCacheStorage;

use crate::errors::Result;
use crate::{CachedResponse, RequestKey};
use async_trait::async_trait;
use std::sync::Arc;

/// The cache namespace: a set of named stores, at most one current.
///
/// Mirrors the host platform's cache-storage surface: open-named-store,
/// list-store-names, delete-store-by-name.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the named store, creating it if absent
    async fn open_store(&self, name: &str) -> Result<Arc<dyn CacheStore>>;

    /// List the names of all existing stores
    async fn list_stores(&self) -> Result<Vec<String>>;

    /// Delete the named store and all its entries.
    /// Returns `true` if the store existed.
    async fn delete_store(&self, name: &str) -> Result<bool>;
}

/// One named store of request→response entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Name of this store (the generation identifier it was opened under)
    fn name(&self) -> &str;

    /// Store a response under the given request key
    async fn put(&self, key: &RequestKey, response: &CachedResponse) -> Result<()>;

    /// Look up a stored response for the given request key
    async fn lookup(&self, key: &RequestKey) -> Result<Option<CachedResponse>>;

    /// Whether an entry exists for the given request key
    async fn contains(&self, key: &RequestKey) -> Result<bool>;

    /// Number of entries in this store
    async fn entry_count(&self) -> Result<usize>;
}
