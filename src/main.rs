//! `suntrack` listens for tracker connections until interrupted.
//!
//! Usage: `suntrack [CONFIG.yaml]`. Without a path the built-in defaults are used.
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use anyhow::{Context, Result};
use suntrack::{Config, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("loading configuration from {}", path.to_string_lossy()))?,
        None => Config::default(),
    };

    let server = Server::bind(config).await.context("starting device listener")?;
    let handle = server.spawn();
    info!(addr = %handle.local_addr(), "suntrack running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");

    let pipeline = handle.pipeline();
    handle.shutdown().await?;

    let stats = pipeline.stats();
    info!(
        records = stats.records_stored,
        decode_failures = stats.decode_failures,
        pending_sessions = pipeline.pending_sessions(),
        "Shutdown complete"
    );
    Ok(())
}
