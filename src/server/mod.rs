//! TCP acceptor for device connections.
//!
//! [`Server::run`] accepts connections until cancelled and gives each one its own task.
//! A background sweeper purges stale reassembly sessions. Accept failures are logged and
//! retried with backoff; they never stop the listener.
//!
//! ```rust,no_run
//! use suntrack::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> suntrack::Result<()> {
//!     let server = Server::bind(Config::default()).await?;
//!     let handle = server.spawn();
//!     println!("listening on {}", handle.local_addr());
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown().await
//! }
//! ```

mod connection;

pub use connection::ConnectionSummary;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{Config, ProtocolOptions};
use crate::pipeline::Pipeline;
use crate::{ErrorScope, IngestError, Result};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// A bound listener plus the shared ingestion state.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    config: Config,
}

impl Server {
    /// Validate the configuration and bind the listening socket.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let addr = config.listen_addr();
        let listener =
            TcpListener::bind(addr).await.map_err(|source| IngestError::Bind { addr, source })?;
        let local_addr =
            listener.local_addr().map_err(|source| IngestError::Bind { addr, source })?;

        info!(%local_addr, capacity = config.capacity, "Listening for device connections");
        let pipeline = Arc::new(Pipeline::new(&config));
        Ok(Self { listener, local_addr, pipeline, config })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared state for readers such as a display layer.
    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Run in a background task.
    pub fn spawn(self) -> ServerHandle {
        let cancel = CancellationToken::new();
        let local_addr = self.local_addr;
        let pipeline = self.pipeline();
        let task = tokio::spawn(self.run(cancel.clone()));
        ServerHandle { local_addr, pipeline, cancel, task }
    }

    /// Accept connections until `cancel` fires, then wait for connection tasks to finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let connections = TaskTracker::new();
        let sweeper = tokio::spawn(sweep_stale_sessions(
            Arc::clone(&self.pipeline),
            self.config.reassembly_timeout(),
            cancel.clone(),
        ));

        let mut error_count = 0u32;
        let mut accepted = 0u64;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Acceptor cancelled");
                    break;
                }
                result = self.listener.accept() => result,
            };

            match result {
                Ok((stream, peer)) => {
                    error_count = 0;
                    accepted += 1;
                    if let Err(error) = stream.set_nodelay(true) {
                        debug!(%peer, %error, "Could not disable Nagle");
                    }
                    debug!(%peer, "Accepted device connection");

                    let span = info_span!("connection", %peer);
                    connections.spawn(
                        handle_connection(
                            stream,
                            peer,
                            Arc::clone(&self.pipeline),
                            self.config.protocol.clone(),
                            cancel.child_token(),
                        )
                        .instrument(span),
                    );
                }
                Err(source) => {
                    error_count += 1;
                    error!(error = %source, attempt = error_count, "Accept failed");
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        connections.close();
        connections.wait().await;
        if let Err(error) = sweeper.await {
            warn!(%error, "Session sweeper ended abnormally");
        }

        info!(accepted, "Server stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<Pipeline>,
    options: ProtocolOptions,
    cancel: CancellationToken,
) {
    match connection::serve(stream, peer, pipeline, options, cancel).await {
        Ok(summary) => info!(
            accepted = summary.accepted,
            undecodable = summary.undecodable,
            discarded_bytes = summary.framing.discarded_bytes,
            checksum_failures = summary.framing.checksum_failures,
            "Connection closed"
        ),
        Err(error) if error.scope() == ErrorScope::Connection => {
            info!(%error, "Connection ended")
        }
        Err(error) => warn!(%error, "Connection failed"),
    }
}

async fn sweep_stale_sessions(pipeline: Arc<Pipeline>, timeout: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval((timeout / 4).max(MIN_SWEEP_INTERVAL));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let purged = pipeline.purge_stale(tokio::time::Instant::now().into_std());
                if purged > 0 {
                    debug!(purged, pending = pipeline.pending_sessions(), "Swept stale reassembly sessions");
                }
            }
        }
    }
}

/// A server running in the background.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Token that stops the server when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting, close every connection and wait for the server task.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(_) => Ok(()),
        }
    }
}
