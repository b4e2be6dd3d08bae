//! # Network Fetch Module
//!
//! ## Purpose
//! Network access for the cache agent behind an injectable trait. The HTTP
//! implementation resolves root-relative manifest entries against the
//! configured origin and passes cross-origin URLs through untouched.
//!
//! ## Input/Output Specification
//! - **Input**: Request keys (method + URL)
//! - **Output**: `CachedResponse` payloads, or an error on transport failure
//! - **Contract**: Errors ONLY on transport failure; non-success status codes
//!   are returned as responses and interpreted by the caller
//!
//! The install path rejects non-success statuses itself (batch-populate
//! semantics), while the interception path forwards them as live responses.

use crate::config::FetchConfig;
use crate::errors::{AgentError, Result};
use crate::{CachedResponse, RequestKey};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use std::time::Duration;

/// Network access as seen by the cache agent
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Perform the request described by `key` over the live network.
    ///
    /// Returns `Err` only when the transport itself fails (connection
    /// refused, timeout, DNS); any received response, whatever its status,
    /// is a successful fetch.
    async fn fetch(&self, key: &RequestKey) -> Result<CachedResponse>;
}

/// HTTP fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    /// Build a fetcher from network configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()?;

        let origin = Url::parse(&config.origin).map_err(|e| AgentError::Config {
            message: format!("invalid fetch origin '{}': {}", config.origin, e),
        })?;

        Ok(Self { client, origin })
    }

    /// Resolve a manifest or request URL to an absolute URL
    fn resolve(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Url::parse(url).map_err(|e| AgentError::Config {
                message: format!("invalid absolute URL '{}': {}", url, e),
            })
        } else {
            self.origin.join(url).map_err(|e| AgentError::Config {
                message: format!("cannot resolve '{}' against origin: {}", url, e),
            })
        }
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, key: &RequestKey) -> Result<CachedResponse> {
        let target = self.resolve(&key.url)?;
        let method = reqwest::Method::from_bytes(key.method.as_bytes()).map_err(|e| {
            AgentError::Internal {
                message: format!("invalid HTTP method '{}': {}", key.method, e),
            }
        })?;

        let response = self
            .client
            .request(method, target)
            .send()
            .await
            .map_err(|e| AgentError::NetworkUnreachable {
                url: key.url.clone(),
                details: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| AgentError::NetworkUnreachable {
                url: key.url.clone(),
                details: format!("body read failed: {}", e),
            })?;

        tracing::debug!("Fetched {} -> {} ({} bytes)", key, status, body.len());

        Ok(CachedResponse {
            url: final_url,
            status,
            headers,
            body: body.to_vec(),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(origin: &str) -> HttpFetcher {
        HttpFetcher::new(&FetchConfig {
            origin: origin.to_string(),
            timeout_seconds: 5,
            user_agent: "offline-cache-agent-test".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_relative_url_resolves_against_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let response = fetcher
            .fetch(&RequestKey::get("/static/index.html"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body_text(), "<html></html>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let response = fetcher.fetch(&RequestKey::get("/missing")).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_unreachable() {
        // Port 1 is never listening
        let fetcher = fetcher_for("http://127.0.0.1:1");
        let result = fetcher.fetch(&RequestKey::get("/")).await;
        assert!(matches!(
            result,
            Err(AgentError::NetworkUnreachable { .. })
        ));
    }
}
