//! Relock allocator server binary.
//!
//! Loads the signing key from the environment, verifies the configured
//! allocator address, prefetches the supported-chain configuration, and
//! serves the JSON/HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relock_engine::{AllocationEngine, EngineConfig, MemoryStore};
use relock_server::config::EnvConfig;
use relock_server::indexer_http::{HttpIndexerClient, HttpIndexerConfig};
use relock_server::rest::{self, AppState};
use tracing::{info, warn};

/// Relock resource-lock allocator.
#[derive(Parser, Debug)]
#[command(name = "relock-server", about = "Resource-lock allocator server")]
struct Cli {
    /// HTTP listen address.
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Indexer GraphQL endpoint; falls back to the INDEXER_URL environment
    /// variable.
    #[arg(long)]
    indexer_url: Option<String>,

    /// Client-side timeout for indexer calls, in milliseconds.
    #[arg(long, default_value = "5000")]
    indexer_timeout_ms: u64,

    /// Maximum fragment scan when suggesting a nonce.
    #[arg(long, default_value = "1024")]
    nonce_scan_limit: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let env = EnvConfig::from_env()?;
    let signer = env.build_signer()?;

    let indexer_url = cli
        .indexer_url
        .or(env.indexer_url)
        .ok_or("indexer endpoint required (--indexer-url or INDEXER_URL)")?;
    let indexer_timeout = Duration::from_millis(cli.indexer_timeout_ms);
    let indexer = HttpIndexerClient::new(HttpIndexerConfig {
        endpoint: indexer_url.clone(),
        timeout: indexer_timeout,
    })?;

    let engine = Arc::new(AllocationEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(indexer),
        signer,
        EngineConfig {
            indexer_timeout,
            nonce_scan_limit: cli.nonce_scan_limit,
        },
    ));

    match engine.refresh_supported_chains().await {
        Ok(chains) => info!(chains, "loaded supported-chain configuration"),
        Err(err) => warn!(error = %err, "starting with an empty supported-chain cache"),
    }

    info!(
        listen = %cli.listen,
        allocator = %engine.allocator_address(),
        indexer = indexer_url.as_str(),
        "starting relock allocator"
    );

    let router = rest::router(Arc::new(AppState { engine }));
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
