//! # Tally Server
//!
//! The main entry point for the live vote engine.
//!
//! ## Startup Sequence
//!
//! 1. Initialize tracing (env-filter, `RUST_LOG`)
//! 2. Load configuration (defaults, then environment overrides)
//! 3. Open the journaled vote store (failure here is fatal)
//! 4. Wire the authenticator and gateway service
//! 5. Spawn the periodic journal compaction task
//! 6. Serve until Ctrl+C, then compact once more and exit
//!
//! ## Environment
//!
//! - `TALLY_HOST` / `TALLY_PORT` - listener bind address
//! - `TALLY_AUTH_ENDPOINT` / `TALLY_AUTH_TIMEOUT_SECS` - credential validator
//! - `TALLY_VOTE_THRESHOLD` / `TALLY_VOTE_TTL_SECS` - vote budget per user
//! - `TALLY_DATA_DIR` - where the vote journal lives (default `./data`)
//! - `TALLY_COMPACTION_SECS` - seconds between journal compaction passes
//! - `RUST_LOG` - tracing filter (default `info`)
//!
//! Invalid values fail startup; a missing variable falls back to its default.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tally_gateway::{GatewayConfig, HttpAuthenticator, VoteGatewayService};
use tally_limiter::RateLimiter;
use tally_store::{FileBackedKVStore, VoteStoreService};

/// File name of the vote journal inside the data directory.
const JOURNAL_FILE: &str = "votes.journal";

/// Load configuration from defaults and environment overrides.
fn load_config() -> Result<(GatewayConfig, PathBuf)> {
    let mut config = GatewayConfig::default();

    if let Ok(host) = std::env::var("TALLY_HOST") {
        config.listen.host = host
            .parse()
            .with_context(|| format!("TALLY_HOST is not an IP address: {host}"))?;
    }
    if let Ok(port) = std::env::var("TALLY_PORT") {
        config.listen.port = port
            .parse()
            .with_context(|| format!("TALLY_PORT is not a port number: {port}"))?;
    }
    if let Ok(endpoint) = std::env::var("TALLY_AUTH_ENDPOINT") {
        config.auth.endpoint = endpoint;
    }
    if let Ok(timeout) = std::env::var("TALLY_AUTH_TIMEOUT_SECS") {
        config.auth.timeout_secs = timeout
            .parse()
            .with_context(|| format!("TALLY_AUTH_TIMEOUT_SECS is not a number: {timeout}"))?;
    }
    if let Ok(threshold) = std::env::var("TALLY_VOTE_THRESHOLD") {
        config.rate_limit.threshold = threshold
            .parse()
            .with_context(|| format!("TALLY_VOTE_THRESHOLD is not a number: {threshold}"))?;
    }
    if let Ok(ttl) = std::env::var("TALLY_VOTE_TTL_SECS") {
        config.rate_limit.ttl_secs = ttl
            .parse()
            .with_context(|| format!("TALLY_VOTE_TTL_SECS is not a number: {ttl}"))?;
    }
    if let Ok(interval) = std::env::var("TALLY_COMPACTION_SECS") {
        config.compaction.interval_secs = interval
            .parse()
            .with_context(|| format!("TALLY_COMPACTION_SECS is not a number: {interval}"))?;
    }

    let data_dir = std::env::var("TALLY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));

    config
        .validate()
        .context("Invalid gateway configuration")?;

    Ok((config, data_dir))
}

/// Compact the journal on a fixed cadence until the process exits.
fn spawn_compaction_task(kv: Arc<FileBackedKVStore>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so compaction does not
        // race startup replay.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match kv.compact() {
                Ok(()) => info!("Journal compaction pass complete"),
                Err(e) => error!(error = %e, "Journal compaction failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("===========================================");
    info!("  Tally Server v{}", tally_gateway::VERSION);
    info!("===========================================");

    // Load configuration
    let (config, data_dir) = load_config()?;

    // Open the journaled store. A journal that cannot be opened or replayed
    // is fatal; serving votes without durability is worse than not serving.
    let journal_path = data_dir.join(JOURNAL_FILE);
    let kv = Arc::new(
        FileBackedKVStore::open(&journal_path)
            .with_context(|| format!("Failed to open vote journal at {}", journal_path.display()))?,
    );

    let store = Arc::new(VoteStoreService::new(Arc::clone(&kv)));
    let limiter = RateLimiter::with_system_time(config.rate_limit);
    let auth = Arc::new(HttpAuthenticator::new(&config.auth)?);

    spawn_compaction_task(Arc::clone(&kv), config.compaction.interval());

    let compaction_secs = config.compaction.interval_secs;
    let mut service = VoteGatewayService::new(config, store, limiter, auth)?;

    info!("Vote journal: {}", journal_path.display());
    info!("Compaction interval: {compaction_secs}s");

    // Serve until Ctrl+C or a fatal server error.
    tokio::select! {
        result = service.start() => {
            result?;
            warn!("Gateway stopped on its own");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down...");
        }
    }
    service.shutdown();

    // One last compaction so the journal restarts small.
    if let Err(e) = kv.compact() {
        error!(error = %e, "Final journal compaction failed");
    }

    info!("Shutdown complete");
    Ok(())
}
