//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the offline cache agent, covering the
//! precache batch, store lifecycle, and fetch interception paths.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from storage, network, and lifecycle code
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Precache, Lifecycle, Network, Storage, Configuration
//!
//! ## Key Features
//! - One error enum with detailed per-variant context
//! - Automatic conversion from backend error types
//! - Recoverability classification for host retry decisions

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error types for the offline cache agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// A manifest URL could not be fetched and stored during install.
    /// Fails the entire install batch.
    #[error("precache of '{url}' failed: {details}")]
    PrecacheFailed { url: String, details: String },

    /// The live network attempt for an intercepted request failed outright
    #[error("network unreachable for '{url}': {details}")]
    NetworkUnreachable { url: String, details: String },

    /// Network failed and no cached entry exists for the request key
    #[error("no cached entry for '{url}' after network failure")]
    CacheMiss { url: String },

    /// An entry point was invoked in a lifecycle state that does not accept it
    #[error("'{event}' event rejected in state '{state}'")]
    LifecycleViolation { event: String, state: String },

    /// A named cache store could not be opened
    #[error("cache store '{name}' unavailable: {reason}")]
    StoreUnavailable { name: String, reason: String },

    /// Storage backend errors
    #[error("storage backend error: {0}")]
    StorageBackend(#[from] sled::Error),

    /// Serialization errors for stored responses
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// HTTP client construction or protocol errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Manifest validation errors
    #[error("invalid precache manifest: {reason}")]
    InvalidManifest { reason: String },

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal system errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Check if the error is recoverable (the host may retry the operation)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::PrecacheFailed { .. }
                | AgentError::NetworkUnreachable { .. }
                | AgentError::Http(_)
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            AgentError::PrecacheFailed { .. } => "precache",
            AgentError::NetworkUnreachable { .. }
            | AgentError::CacheMiss { .. }
            | AgentError::Http(_) => "fetch",
            AgentError::LifecycleViolation { .. } => "lifecycle",
            AgentError::StoreUnavailable { .. }
            | AgentError::StorageBackend(_)
            | AgentError::Serialization(_) => "storage",
            AgentError::Config { .. }
            | AgentError::InvalidManifest { .. }
            | AgentError::Toml(_) => "configuration",
            AgentError::Io(_) | AgentError::Internal { .. } => "system",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = AgentError::PrecacheFailed {
            url: "/static/index.html".to_string(),
            details: "timeout".to_string(),
        };
        assert_eq!(err.category(), "precache");
        assert!(err.is_recoverable());

        let err = AgentError::CacheMiss {
            url: "/api/filter".to_string(),
        };
        assert_eq!(err.category(), "fetch");
        assert!(!err.is_recoverable());

        let err = AgentError::LifecycleViolation {
            event: "fetch".to_string(),
            state: "installing".to_string(),
        };
        assert_eq!(err.category(), "lifecycle");
    }
}
