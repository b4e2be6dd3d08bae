//! # Precache Manifest Module
//!
//! ## Purpose
//! Validates and holds the ordered list of asset URLs that must be available
//! offline. The manifest is fixed for the lifetime of one agent version and
//! is the only source of cache writes in the whole design.
//!
//! ## Input/Output Specification
//! - **Input**: Raw URL strings from configuration
//! - **Output**: A validated, immutable manifest and its request keys
//! - **Validation**: Non-empty, no duplicates, absolute or root-relative URLs

use crate::errors::{AgentError, Result};
use crate::RequestKey;

/// Ordered, immutable list of URLs fetched and stored at install time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    urls: Vec<String>,
}

impl PrecacheManifest {
    /// Build a manifest from raw URL strings, validating every entry.
    ///
    /// Entries must be absolute (`http://` / `https://`) or root-relative
    /// (leading `/`). Duplicates are rejected because the install batch
    /// treats each entry as a distinct store key.
    pub fn from_urls<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();

        if urls.is_empty() {
            return Err(AgentError::InvalidManifest {
                reason: "manifest contains no URLs".to_string(),
            });
        }

        for url in &urls {
            if !Self::is_valid_entry(url) {
                return Err(AgentError::InvalidManifest {
                    reason: format!("'{}' is neither absolute nor root-relative", url),
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for url in &urls {
            if !seen.insert(url.as_str()) {
                return Err(AgentError::InvalidManifest {
                    reason: format!("duplicate entry '{}'", url),
                });
            }
        }

        Ok(Self { urls })
    }

    fn is_valid_entry(url: &str) -> bool {
        url.starts_with('/') || url.starts_with("http://") || url.starts_with("https://")
    }

    /// Number of manifest entries
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether the manifest is empty (never true after validation)
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Iterate over entries in manifest order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// Request keys for all entries, in manifest order
    pub fn request_keys(&self) -> Vec<RequestKey> {
        self.urls.iter().map(RequestKey::get).collect()
    }
}
