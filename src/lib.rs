//! # Offline Cache Agent
//!
//! ## Overview
//! This library implements an offline-caching agent for a web application:
//! it pre-populates a named cache of static assets at install time, reclaims
//! stale cache generations on activation, and answers intercepted requests
//! with a network-first, cache-fallback policy.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `agent`: The lifecycle state machine and the three host entry points
//! - `manifest`: The ordered, validated precache manifest
//! - `fetch`: Network access behind the `NetworkFetcher` trait
//! - `storage`: Named cache stores behind the `CacheStorage` trait
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Host lifecycle events (install, activate) and intercepted requests
//! - **Output**: Live or precached responses; durable cache-store mutations
//! - **Policy**: Network-first with cache fallback; cache written only at install
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use offline_cache_agent::{AgentConfig, CacheAgent};
//! use offline_cache_agent::fetch::HttpFetcher;
//! use offline_cache_agent::storage::SledCacheStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::from_file("config.toml")?;
//!     let storage = Arc::new(SledCacheStorage::open(&config.storage)?);
//!     let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
//!     let agent = CacheAgent::new(config, storage, fetcher)?;
//!     agent.on_install().await?;
//!     agent.on_activate().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod agent;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod manifest;
pub mod storage;

// Re-exports for convenience
pub use agent::{AgentState, AgentStats, CacheAgent};
pub use config::AgentConfig;
pub use errors::{AgentError, Result};
pub use manifest::PrecacheManifest;

// Core types used throughout the system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cache lookup key for an intercepted or precached request.
///
/// Effectively GET-only in this design, but the method is kept in the key so
/// that stored entries can never shadow a request issued with a different verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    /// HTTP method, normalized to uppercase
    pub method: String,
    /// Absolute or root-relative URL as issued by the requester
    pub url: String,
}

impl RequestKey {
    /// Build a key for an arbitrary method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
        }
    }

    /// Build a GET key, the common case for static assets
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Byte encoding used as the storage key within a cache store
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{} {}", self.method, self.url).into_bytes()
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response payload as held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// URL the response was fetched from (after origin resolution)
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers, in arrival order
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Vec<u8>,
    /// When the response was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Whether the status code is in the 2xx success range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Where an intercepted request's response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseSource {
    /// Live network response
    Network,
    /// Precached entry served after a network failure
    Cache,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
        }
    }
}

/// Resolution of an intercepted request: the response plus its provenance.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    /// Where the response came from
    pub source: ResponseSource,
    /// The response handed back to the requester
    pub response: CachedResponse,
}
