//! Per-connection reader loop

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ProtocolOptions;
use crate::pipeline::{IngestOutcome, Pipeline};
use crate::protocol::{FrameCodec, FramingStats};
use crate::{IngestError, Result};

/// How a connection ended and what it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub peer: SocketAddr,
    /// Frames that decoded and were stored or held for reassembly.
    pub accepted: u64,
    /// Frames that passed framing but failed to decode.
    pub undecodable: u64,
    pub framing: FramingStats,
}

/// Read frames from one device until it disconnects, goes idle or shutdown is requested.
///
/// Framing and decode problems stay inside this loop. Only transport failures and the
/// idle timeout end the connection with an error. A peer counts as idle when no bytes
/// arrive for the whole timeout, whether or not earlier bytes formed a frame.
pub(crate) async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<Pipeline>,
    options: ProtocolOptions,
    cancel: CancellationToken,
) -> Result<ConnectionSummary> {
    let mut framed = Framed::new(stream, FrameCodec::new(options.framing));
    let mut accepted = 0u64;
    let mut undecodable = 0u64;
    let mut seen = bytes_since_last_frame(&framed);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Connection cancelled by shutdown");
                break;
            }
            next = tokio::time::timeout(options.idle_timeout, framed.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                let received = bytes_since_last_frame(&framed);
                if received == seen {
                    return Err(IngestError::IdleTimeout { peer, idle: options.idle_timeout });
                }
                trace!(bytes = received - seen, "No frame yet but peer still sending");
                seen = received;
                continue;
            }
            Ok(None) => {
                debug!("Peer closed connection");
                break;
            }
            Ok(Some(Err(error))) => return Err(attach_peer(error, peer)),
            Ok(Some(Ok(frame))) => frame,
        };
        seen = bytes_since_last_frame(&framed);

        let now = tokio::time::Instant::now().into_std();
        match pipeline.ingest(&frame, Some(peer), now) {
            Ok(outcome) => {
                if !outcome.is_accepted() {
                    continue;
                }
                accepted += 1;
                if let IngestOutcome::Held { received, total } = outcome {
                    trace!(received, total, "Holding sensor fragment");
                }
                if options.acknowledge {
                    framed.send(frame.acknowledgment()).await.map_err(|error| attach_peer(error, peer))?;
                }
            }
            Err(error) => {
                undecodable += 1;
                warn!(%error, len = frame.as_bytes().len(), "Dropping undecodable frame");
            }
        }
    }

    Ok(ConnectionSummary { peer, accepted, undecodable, framing: framed.codec().stats() })
}

/// Bytes read from the socket that have not yet completed a frame: discarded noise plus
/// whatever is still buffered.
fn bytes_since_last_frame(framed: &Framed<TcpStream, FrameCodec>) -> u64 {
    framed.codec().stats().discarded_bytes + framed.read_buffer().len() as u64
}

/// Codec I/O errors carry no peer; fill it in.
fn attach_peer(error: IngestError, peer: SocketAddr) -> IngestError {
    match error {
        IngestError::Transport { peer: None, source } => IngestError::transport(peer, source),
        other => other,
    }
}
