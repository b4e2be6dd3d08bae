//! End-to-end lifecycle tests against real HTTP and durable storage:
//! install precaches from a live server into sled, activation reclaims the
//! previous generation, and interception falls back to the precached
//! snapshot once the server goes away.

use std::sync::Arc;

use offline_cache_agent::config::{AgentConfig, FetchConfig, StorageConfig};
use offline_cache_agent::fetch::HttpFetcher;
use offline_cache_agent::storage::{CacheStorage, CacheStore, SledCacheStorage};
use offline_cache_agent::{AgentError, AgentState, CacheAgent, RequestKey, ResponseSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &[&str] = &["/", "/static/index.html", "/static/manifest.json"];

async fn serve_manifest(server: &MockServer) {
    for url in MANIFEST {
        Mock::given(method("GET"))
            .and(path(*url))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("asset:{}", url)))
            .mount(server)
            .await;
    }
}

fn test_config(origin: &str, db_path: std::path::PathBuf) -> AgentConfig {
    AgentConfig {
        generation: "cfop-cache-v1".to_string(),
        precache: MANIFEST.iter().map(|u| u.to_string()).collect(),
        fetch: FetchConfig {
            origin: origin.to_string(),
            timeout_seconds: 5,
            user_agent: "offline-cache-agent-test".to_string(),
        },
        storage: StorageConfig {
            db_path,
            enable_compression: true,
        },
        logging: offline_cache_agent::config::LoggingConfig {
            level: "warn".to_string(),
            json_format: false,
        },
    }
}

fn build_agent(config: AgentConfig) -> (Arc<SledCacheStorage>, CacheAgent) {
    let storage = Arc::new(SledCacheStorage::open(&config.storage).unwrap());
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch).unwrap());
    let agent = CacheAgent::new(config, storage.clone() as Arc<dyn CacheStorage>, fetcher).unwrap();
    (storage, agent)
}

#[tokio::test]
async fn full_lifecycle_with_offline_fallback() {
    // A dedicated listener opts out of wiremock's server pool, so dropping
    // the server below actually closes the port instead of returning the
    // still-listening server to the pool.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let server = MockServer::builder().listener(listener).start().await;
    serve_manifest(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path().join("cache.db"));
    let (storage, agent) = build_agent(config);

    // A stale generation left behind by an earlier deployment
    storage.open_store("cfop-cache-v0").await.unwrap();

    agent.on_install().await.unwrap();
    assert_eq!(agent.state().await, AgentState::Installed);

    // Every manifest URL is retrievable from the current store
    let store = storage.open_store("cfop-cache-v1").await.unwrap();
    for url in MANIFEST {
        let cached = store.lookup(&RequestKey::get(*url)).await.unwrap();
        assert_eq!(cached.unwrap().body_text(), format!("asset:{}", url));
    }

    agent.on_activate().await.unwrap();
    assert_eq!(agent.state().await, AgentState::Active);
    assert_eq!(storage.list_stores().await.unwrap(), vec!["cfop-cache-v1"]);

    // Online: answered live, and the live response is not written back
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .mount(&server)
        .await;

    let answered = agent
        .on_fetch_intercept(&RequestKey::get("/api/health"))
        .await
        .unwrap();
    assert_eq!(answered.source, ResponseSource::Network);
    assert!(!store
        .contains(&RequestKey::get("/api/health"))
        .await
        .unwrap());

    // Offline: the server disappears, precached entries still resolve
    drop(server);

    let answered = agent
        .on_fetch_intercept(&RequestKey::get("/static/index.html"))
        .await
        .unwrap();
    assert_eq!(answered.source, ResponseSource::Cache);
    assert_eq!(answered.response.body_text(), "asset:/static/index.html");

    // Never-cached URL with no network resolves to a failure
    let result = agent
        .on_fetch_intercept(&RequestKey::get("/api/health"))
        .await;
    assert!(matches!(result, Err(AgentError::CacheMiss { .. })));
}

#[tokio::test]
async fn failing_manifest_url_aborts_install() {
    let server = MockServer::start().await;
    // "/" resolves, the rest of the manifest 404s
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("index"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path().join("cache.db"));
    let (_storage, agent) = build_agent(config);

    let result = agent.on_install().await;
    assert!(matches!(result, Err(AgentError::PrecacheFailed { .. })));
    assert_eq!(agent.state().await, AgentState::Uninstalled);
}

#[tokio::test]
async fn precached_state_survives_reopen() {
    let server = MockServer::start().await;
    serve_manifest(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.db");

    {
        let config = test_config(&server.uri(), db_path.clone());
        let (_storage, agent) = build_agent(config);
        agent.on_install().await.unwrap();
        agent.on_activate().await.unwrap();
    }

    // A later host run reopens the same database; entries are still there
    let config = test_config(&server.uri(), db_path);
    let storage = SledCacheStorage::open(&config.storage).unwrap();
    let store = storage.open_store("cfop-cache-v1").await.unwrap();
    assert_eq!(store.entry_count().await.unwrap(), MANIFEST.len());
}
