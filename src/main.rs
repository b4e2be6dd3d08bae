//! # Cache Agent Host Simulator
//!
//! ## Purpose
//! Plays the host platform for the offline cache agent: drives the install
//! and activate lifecycle events, then resolves requested URLs through fetch
//! interception, reporting whether each was answered from the network or the
//! precached snapshot.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, environment variables
//! - **Output**: Lifecycle progress, interception results, final agent counters
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Build storage backend (sled, or in-memory for dry runs) and HTTP fetcher
//! 4. Drive install → activate
//! 5. Resolve any `--fetch` URLs through interception

use clap::{Arg, Command};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use offline_cache_agent::{
    config::AgentConfig,
    errors::{AgentError, Result},
    fetch::HttpFetcher,
    storage::{CacheStorage, MemoryCacheStorage, SledCacheStorage},
    CacheAgent, RequestKey,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("cache-agent-host")
        .version(env!("CARGO_PKG_VERSION"))
        .author("CFOP Web Team")
        .about("Host simulator for the offline cache agent")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("fetch")
                .short('f')
                .long("fetch")
                .value_name("URL")
                .help("URL to resolve through fetch interception (repeatable)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Use in-memory cache storage instead of the sled database")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Validate configuration and storage reachability, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let config = AgentConfig::from_file(config_path)?;

    init_logging(&config)?;

    info!(
        "Starting cache agent host (generation '{}')",
        config.generation
    );

    if matches.get_flag("check-health") {
        return run_health_checks(&config).await;
    }

    let storage: Arc<dyn CacheStorage> = if matches.get_flag("dry-run") {
        info!("Dry run: using in-memory cache storage");
        Arc::new(MemoryCacheStorage::new())
    } else {
        Arc::new(SledCacheStorage::open(&config.storage)?)
    };

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let agent = CacheAgent::new(config, storage, fetcher)?;

    // Host contract: install must complete before the agent is installed,
    // activation cleanup before it takes control
    agent.on_install().await?;
    agent.on_activate().await?;

    let urls: Vec<String> = matches
        .get_many::<String>("fetch")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut failures = 0;
    for url in &urls {
        match agent.on_fetch_intercept(&RequestKey::get(url)).await {
            Ok(answered) => {
                info!(
                    "{} -> {} via {} ({} bytes)",
                    url,
                    answered.response.status,
                    answered.source,
                    answered.response.body.len()
                );
            }
            Err(e) => {
                error!("{} -> failed: {}", url, e);
                failures += 1;
            }
        }
    }

    let stats = agent.stats().await;
    info!(
        "Agent counters: {}",
        serde_json::to_string(&stats).map_err(|e| AgentError::Internal {
            message: format!("failed to serialize stats: {}", e),
        })?
    );

    if failures > 0 {
        return Err(AgentError::Internal {
            message: format!("{} of {} fetches failed", failures, urls.len()),
        });
    }

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &AgentConfig) -> Result<()> {
    let log_level: tracing::Level =
        config
            .logging
            .level
            .parse()
            .map_err(|_| AgentError::Config {
                message: format!("Invalid log level: {}", config.logging.level),
            })?;

    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.with_filter(filter))
            .init();
    }

    Ok(())
}

/// Validate configuration and storage reachability
async fn run_health_checks(config: &AgentConfig) -> Result<()> {
    info!("Running health checks...");

    // Configuration already validated by from_file
    info!("✓ Configuration is valid");

    let storage = SledCacheStorage::open(&config.storage)?;
    let stores = storage.list_stores().await?;
    info!("✓ Cache storage reachable ({} store(s))", stores.len());

    HttpFetcher::new(&config.fetch)?;
    info!("✓ HTTP fetcher constructed");

    info!("All health checks passed!");
    Ok(())
}
