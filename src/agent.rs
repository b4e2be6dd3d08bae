//! # Cache Agent Module
//!
//! ## Purpose
//! The lifecycle state machine at the heart of the crate. The host drives it
//! through three async entry points — install, activate, fetch interception —
//! and awaits each returned future before considering the event resolved.
//!
//! ## Input/Output Specification
//! - **Input**: Lifecycle events and intercepted request keys
//! - **Output**: State transitions, store mutations, intercepted responses
//! - **States**: `Uninstalled → Installing → Installed → Activating → Active`
//!
//! ## Key Features
//! - All-or-nothing precache batch during install
//! - Best-effort concurrent reclamation of stale generations on activation
//! - Network-first, cache-fallback interception with no runtime cache writes

use crate::config::AgentConfig;
use crate::errors::{AgentError, Result};
use crate::fetch::NetworkFetcher;
use crate::manifest::PrecacheManifest;
use crate::storage::{CacheStorage, CacheStore};
use crate::{InterceptedResponse, RequestKey, ResponseSource};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lifecycle states of the cache agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentState {
    /// No install has succeeded for this agent version
    Uninstalled,
    /// Precache batch in flight
    Installing,
    /// Precache complete; waiting to take control
    Installed,
    /// Stale-generation cleanup in flight
    Activating,
    /// In control; fetch interception enabled
    Active,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentState::Uninstalled => "uninstalled",
            AgentState::Installing => "installing",
            AgentState::Installed => "installed",
            AgentState::Activating => "activating",
            AgentState::Active => "active",
        };
        write!(f, "{}", name)
    }
}

/// Counters tracking what the agent has done so far
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    /// Manifest entries stored during the last successful install
    pub precached_entries: usize,
    /// Stale stores deleted during activation
    pub stores_reclaimed: usize,
    /// Interceptions answered from the live network
    pub network_responses: u64,
    /// Interceptions answered from the cache after a network failure
    pub cache_fallbacks: u64,
    /// Interceptions where both network and cache failed
    pub fallback_misses: u64,
}

/// The offline cache agent.
///
/// One instance per registered scope. Storage and network access are
/// injected, so the agent itself carries no ambient platform state.
pub struct CacheAgent {
    generation: String,
    manifest: PrecacheManifest,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn NetworkFetcher>,
    state: RwLock<AgentState>,
    current_store: RwLock<Option<Arc<dyn CacheStore>>>,
    stats: RwLock<AgentStats>,
}

impl CacheAgent {
    /// Create an agent from configuration plus injected storage and fetcher
    pub fn new(
        config: AgentConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn NetworkFetcher>,
    ) -> Result<Self> {
        let manifest = PrecacheManifest::from_urls(config.precache.clone())?;

        Ok(Self {
            generation: config.generation,
            manifest,
            storage,
            fetcher,
            state: RwLock::new(AgentState::Uninstalled),
            current_store: RwLock::new(None),
            stats: RwLock::new(AgentStats::default()),
        })
    }

    /// Current cache generation identifier
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Current lifecycle state
    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    /// Snapshot of the agent's counters
    pub async fn stats(&self) -> AgentStats {
        self.stats.read().await.clone()
    }

    async fn set_state(&self, next: AgentState) {
        let mut state = self.state.write().await;
        debug!("Lifecycle transition: {} -> {}", *state, next);
        *state = next;
    }

    async fn expect_state(&self, expected: AgentState, event: &str) -> Result<()> {
        let state = *self.state.read().await;
        if state != expected {
            return Err(AgentError::LifecycleViolation {
                event: event.to_string(),
                state: state.to_string(),
            });
        }
        Ok(())
    }

    /// Install: open the current generation's store and precache every
    /// manifest URL as one atomic-intent batch.
    ///
    /// All-or-nothing: any fetch failure or non-success status fails the
    /// whole install and the agent returns to `Uninstalled` so the host can
    /// retry. Entries already written are left behind; they are reclaimed by
    /// a later activation under a new generation identifier.
    pub async fn on_install(&self) -> Result<()> {
        self.expect_state(AgentState::Uninstalled, "install").await?;
        self.set_state(AgentState::Installing).await;

        info!(
            "Installing cache generation '{}' ({} manifest entries)",
            self.generation,
            self.manifest.len()
        );

        let store = match self.storage.open_store(&self.generation).await {
            Ok(store) => store,
            Err(e) => {
                self.set_state(AgentState::Uninstalled).await;
                return Err(e);
            }
        };

        let batch = self.manifest.request_keys().into_iter().map(|key| {
            let store = store.clone();
            let fetcher = self.fetcher.clone();
            async move { Self::precache_one(fetcher.as_ref(), store.as_ref(), key).await }
        });

        if let Err(e) = try_join_all(batch).await {
            warn!("Install of '{}' failed: {}", self.generation, e);
            self.set_state(AgentState::Uninstalled).await;
            return Err(e);
        }

        *self.current_store.write().await = Some(store);
        self.stats.write().await.precached_entries = self.manifest.len();
        self.set_state(AgentState::Installed).await;

        info!("Install of '{}' complete", self.generation);
        Ok(())
    }

    /// Fetch and store a single manifest entry
    async fn precache_one(
        fetcher: &dyn NetworkFetcher,
        store: &dyn CacheStore,
        key: RequestKey,
    ) -> Result<()> {
        let response =
            fetcher
                .fetch(&key)
                .await
                .map_err(|e| AgentError::PrecacheFailed {
                    url: key.url.clone(),
                    details: e.to_string(),
                })?;

        // Batch-populate semantics: a reachable server answering with a
        // non-success status still fails the install
        if !response.is_success() {
            return Err(AgentError::PrecacheFailed {
                url: key.url.clone(),
                details: format!("unexpected status {}", response.status),
            });
        }

        store
            .put(&key, &response)
            .await
            .map_err(|e| AgentError::PrecacheFailed {
                url: key.url.clone(),
                details: format!("store write failed: {}", e),
            })
    }

    /// Activate: delete every store whose name differs from the current
    /// generation identifier, then take control.
    ///
    /// Deletions are issued concurrently and all are awaited to settlement;
    /// individual failures are logged and otherwise ignored (best-effort
    /// cleanup, not transactional).
    pub async fn on_activate(&self) -> Result<()> {
        self.expect_state(AgentState::Installed, "activate").await?;
        self.set_state(AgentState::Activating).await;

        let names = match self.storage.list_stores().await {
            Ok(names) => names,
            Err(e) => {
                // Without the name list there is nothing to clean up;
                // activation still proceeds (cleanup is best-effort)
                warn!("Could not enumerate cache stores: {}", e);
                Vec::new()
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| name != &self.generation)
            .collect();

        if !stale.is_empty() {
            info!(
                "Activating '{}': reclaiming {} stale store(s)",
                self.generation,
                stale.len()
            );
        }

        let deletions = stale.iter().map(|name| {
            let storage = self.storage.clone();
            async move { (name.clone(), storage.delete_store(name).await) }
        });

        let mut reclaimed = 0;
        for (name, outcome) in join_all(deletions).await {
            match outcome {
                Ok(true) => {
                    debug!("Reclaimed stale store '{}'", name);
                    reclaimed += 1;
                }
                Ok(false) => debug!("Stale store '{}' already gone", name),
                Err(e) => warn!("Failed to reclaim store '{}': {}", name, e),
            }
        }

        self.stats.write().await.stores_reclaimed = reclaimed;
        self.set_state(AgentState::Active).await;

        info!("Cache generation '{}' is now active", self.generation);
        Ok(())
    }

    /// Fetch interception: network-first with cache fallback.
    ///
    /// A live response is returned as-is, whatever its status, and is never
    /// written to the cache. Only an outright network failure falls back to
    /// the precached snapshot; a fallback miss propagates as `CacheMiss`.
    pub async fn on_fetch_intercept(&self, request: &RequestKey) -> Result<InterceptedResponse> {
        {
            let state = *self.state.read().await;
            if state != AgentState::Active {
                return Err(AgentError::LifecycleViolation {
                    event: "fetch".to_string(),
                    state: state.to_string(),
                });
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.stats.write().await.network_responses += 1;
                debug!("{} answered from network ({})", request, response.status);
                Ok(InterceptedResponse {
                    source: ResponseSource::Network,
                    response,
                })
            }
            Err(network_err) => {
                debug!("{} network attempt failed: {}", request, network_err);
                let store = self.current_store().await?;
                match store.lookup(request).await? {
                    Some(response) => {
                        self.stats.write().await.cache_fallbacks += 1;
                        debug!("{} answered from cache", request);
                        Ok(InterceptedResponse {
                            source: ResponseSource::Cache,
                            response,
                        })
                    }
                    None => {
                        self.stats.write().await.fallback_misses += 1;
                        Err(AgentError::CacheMiss {
                            url: request.url.clone(),
                        })
                    }
                }
            }
        }
    }

    /// Handle to the current generation's store, opening it lazily when the
    /// agent was activated by a host that installed in an earlier run
    async fn current_store(&self) -> Result<Arc<dyn CacheStore>> {
        if let Some(store) = self.current_store.read().await.as_ref() {
            return Ok(store.clone());
        }

        let store = self.storage.open_store(&self.generation).await?;
        *self.current_store.write().await = Some(store.clone());
        Ok(store)
    }
}
