//! Shared ingestion state: decoder output routed into the stores.
//!
//! Every connection task calls [`Pipeline::ingest`] with the frames it reads. Status
//! reports are stored directly, sensor report fragments go through the
//! [`ReassemblyTracker`] and are stored once complete. The display side reads
//! [`Pipeline::snapshot`] or subscribes to [`Pipeline::live_feed`].

use futures::Stream;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use crate::Result;
use crate::config::Config;
use crate::protocol::{RawFrame, decode};
use crate::reassembly::{Assembly, ReassemblyTracker};
use crate::store::{RecordStore, Snapshot};
use crate::types::{BeaconSighting, DecodedMessage, Record};

/// What happened to one decoded frame.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A complete message was stored.
    Stored(Arc<Record>),
    /// A fragment is held until the rest of its scan arrives.
    Held { received: usize, total: u8 },
    /// A fragment conflicted with its session and was dropped.
    Rejected,
}

impl IngestOutcome {
    /// Whether the device should be acknowledged for this frame.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, IngestOutcome::Rejected)
    }
}

/// Counters over the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub records_stored: u64,
    pub fragments_rejected: u64,
    pub sessions_expired: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_decoded: AtomicU64,
    decode_failures: AtomicU64,
    records_stored: AtomicU64,
    fragments_rejected: AtomicU64,
    sessions_expired: AtomicU64,
}

/// Record store, beacon store and reassembly tracker behind one interface.
#[derive(Debug)]
pub struct Pipeline {
    records: RecordStore<Record>,
    beacons: RecordStore<BeaconSighting>,
    tracker: ReassemblyTracker,
    live: broadcast::Sender<Arc<Record>>,
    counters: Counters,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        let (live, _) = broadcast::channel(config.protocol.live_feed_capacity);
        Self {
            records: RecordStore::new(config.capacity),
            beacons: RecordStore::new(config.protocol.beacon_capacity),
            tracker: ReassemblyTracker::new(config.reassembly_timeout()),
            live,
            counters: Counters::default(),
        }
    }

    /// Decode one frame and route the result.
    ///
    /// Decode failures are returned as [`IngestError::Decode`](crate::IngestError::Decode);
    /// they affect only this frame.
    pub fn ingest(&self, frame: &RawFrame, peer: Option<SocketAddr>, now: Instant) -> Result<IngestOutcome> {
        let message = match decode(frame) {
            Ok(message) => message,
            Err(error) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                return Err(error.into());
            }
        };
        self.counters.frames_decoded.fetch_add(1, Ordering::Relaxed);

        let message = match message {
            DecodedMessage::SensorReport(report) => match self.tracker.insert(report, now) {
                Assembly::Complete(merged) => DecodedMessage::SensorReport(merged),
                Assembly::Pending { received, total } => {
                    return Ok(IngestOutcome::Held { received, total });
                }
                Assembly::Rejected { .. } => {
                    self.counters.fragments_rejected.fetch_add(1, Ordering::Relaxed);
                    return Ok(IngestOutcome::Rejected);
                }
            },
            status @ DecodedMessage::StatusReport(_) => status,
        };

        Ok(IngestOutcome::Stored(self.store(message, peer)))
    }

    fn store(&self, message: DecodedMessage, peer: Option<SocketAddr>) -> Arc<Record> {
        let record = self.records.append(Record::new(message, peer));
        self.counters.records_stored.fetch_add(1, Ordering::Relaxed);

        if let DecodedMessage::SensorReport(report) = &record.message {
            for sighting in BeaconSighting::from_report(report, record.received_at) {
                self.beacons.append(sighting);
            }
        }

        debug!(device = %record.message.device(), kind = record.message.kind(), "Stored record");
        // No receivers is the normal state when nobody watches the live feed.
        let _ = self.live.send(Arc::clone(&record));
        record
    }

    /// Discard reassembly sessions that waited too long. Returns how many were dropped.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let purged = self.tracker.purge_stale(now);
        if purged > 0 {
            self.counters.sessions_expired.fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    /// Point-in-time view of retained records, oldest first.
    pub fn snapshot(&self) -> Snapshot<Record> {
        self.records.snapshot()
    }

    /// Point-in-time view of retained tracked-tag sightings, oldest first.
    pub fn beacon_sightings(&self) -> Snapshot<BeaconSighting> {
        self.beacons.snapshot()
    }

    /// Records stored from now on. A subscriber that falls behind skips the oldest updates.
    pub fn live_feed(&self) -> impl Stream<Item = Arc<Record>> + Send + 'static {
        BroadcastStream::new(self.live.subscribe()).filter_map(|item| match item {
            Ok(record) => Some(record),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Live feed subscriber lagging, skipped records");
                None
            }
        })
    }

    pub fn pending_sessions(&self) -> usize {
        self.tracker.pending_sessions()
    }

    pub fn stats(&self) -> IngestStats {
        let c = &self.counters;
        IngestStats {
            frames_decoded: c.frames_decoded.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            records_stored: c.records_stored.load(Ordering::Relaxed),
            fragments_rejected: c.fragments_rejected.load(Ordering::Relaxed),
            sessions_expired: c.sessions_expired.load(Ordering::Relaxed),
        }
    }
}
