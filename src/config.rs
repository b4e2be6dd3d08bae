//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the offline cache agent: cache generation
//! identifier, precache manifest, network fetch settings, storage backend
//! paths, and logging.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Non-empty generation id, manifest URL shape, origin URL
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! ## Usage
//! ```rust,no_run
//! use offline_cache_agent::config::AgentConfig;
//!
//! let config = AgentConfig::from_file("config.toml").unwrap();
//! println!("Cache generation: {}", config.generation);
//! ```

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Cache generation identifier; exactly one is current per deployment.
    /// Bumping it causes the previous generation's store to be reclaimed
    /// on the next activation.
    pub generation: String,
    /// Precache manifest: ordered URLs fetched and stored at install time
    pub precache: Vec<String>,
    /// Network fetch settings
    pub fetch: FetchConfig,
    /// Cache storage backend settings
    pub storage: StorageConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Network fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Origin that root-relative manifest entries resolve against
    pub origin: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Cache storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path for the durable (sled) backend
    pub db_path: PathBuf,
    /// Gzip-compress stored response bodies
    pub enable_compression: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl AgentConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: AgentConfig = toml::from_str(&content).map_err(|e| AgentError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(generation) = std::env::var("CACHE_AGENT_GENERATION") {
            self.generation = generation;
        }
        if let Ok(origin) = std::env::var("CACHE_AGENT_ORIGIN") {
            self.fetch.origin = origin;
        }
        if let Ok(db_path) = std::env::var("CACHE_AGENT_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(level) = std::env::var("CACHE_AGENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(timeout) = std::env::var("CACHE_AGENT_FETCH_TIMEOUT") {
            self.fetch.timeout_seconds = timeout.parse().map_err(|_| AgentError::Config {
                message: "Invalid number in CACHE_AGENT_FETCH_TIMEOUT".to_string(),
            })?;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.generation.trim().is_empty() {
            return Err(AgentError::Config {
                message: "generation identifier cannot be empty".to_string(),
            });
        }

        if self.precache.is_empty() {
            return Err(AgentError::Config {
                message: "precache manifest cannot be empty".to_string(),
            });
        }

        reqwest::Url::parse(&self.fetch.origin).map_err(|e| AgentError::Config {
            message: format!("fetch.origin is not a valid URL: {}", e),
        })?;

        if self.fetch.timeout_seconds == 0 {
            return Err(AgentError::Config {
                message: "fetch.timeout_seconds cannot be zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AgentError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            generation: "cfop-cache-v1".to_string(),
            precache: vec![
                "/".to_string(),
                "/static/index.html".to_string(),
                "/static/manifest.json".to_string(),
                "/static/icon-192.png".to_string(),
                "/static/icon-512.png".to_string(),
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
                    .to_string(),
            ],
            fetch: FetchConfig {
                origin: "http://127.0.0.1:8000".to_string(),
                timeout_seconds: 30,
                user_agent: format!("offline-cache-agent/{}", env!("CARGO_PKG_VERSION")),
            },
            storage: StorageConfig {
                db_path: PathBuf::from("./data/cache_store.db"),
                enable_compression: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}
