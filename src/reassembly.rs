//! Multi-packet sensor report reassembly.
//!
//! A BLE scan with more sensors than fit in one frame arrives as several [`SensorReport`]
//! fragments that share a device and a session identifier. [`ReassemblyTracker`] holds the
//! fragments of each session until every packet index has been seen, then emits one merged
//! report with the sensors concatenated in packet order.
//!
//! Sessions are spread over independently locked shards so fragments of unrelated sessions
//! never wait on each other. Time is passed in explicitly, which keeps staleness handling
//! deterministic under test.
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use suntrack::reassembly::ReassemblyTracker;
//!
//! let tracker = ReassemblyTracker::new(Duration::from_secs(30));
//! assert_eq!(tracker.pending_sessions(), 0);
//! assert_eq!(tracker.purge_stale(Instant::now()), 0);
//! ```

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::types::{DeviceId, SensorReport, SessionId};

const SHARD_COUNT: usize = 16;

/// Identifies one reassembly session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub device: DeviceId,
    pub session: SessionId,
}

impl SessionKey {
    pub fn of(report: &SensorReport) -> Self {
        Self { device: report.device, session: report.session }
    }
}

/// Result of offering one fragment to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    /// Every packet of the session is present; this is the merged report.
    Complete(SensorReport),
    /// The session is still waiting for packets.
    Pending { received: usize, total: u8 },
    /// The fragment disagrees with the session's declared packet count and was dropped.
    Rejected { expected_total: u8, found_total: u8 },
}

#[derive(Debug)]
struct PendingAssembly {
    created: Instant,
    total: u8,
    fragments: BTreeMap<u8, SensorReport>,
}

impl PendingAssembly {
    fn new(total: u8, created: Instant) -> Self {
        Self { created, total, fragments: BTreeMap::new() }
    }

    fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.created) > timeout
    }

    fn is_complete(&self) -> bool {
        self.fragments.len() == usize::from(self.total)
    }

    /// Merge fragments in packet order. The lowest index supplies the header fields.
    fn merge(self) -> Option<SensorReport> {
        let total = self.total;
        let mut fragments = self.fragments.into_values();
        let mut merged = fragments.next()?;
        for fragment in fragments {
            merged.sensors.extend(fragment.sensors);
        }
        merged.total_packets = total;
        Some(merged)
    }
}

/// Sharded map of in-flight reassembly sessions.
#[derive(Debug)]
pub struct ReassemblyTracker {
    shards: Box<[Mutex<HashMap<SessionKey, PendingAssembly>>]>,
    timeout: Duration,
}

impl ReassemblyTracker {
    /// Create a tracker that discards sessions older than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn shard(&self, key: &SessionKey) -> MutexGuard<'_, HashMap<SessionKey, PendingAssembly>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        self.shards[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer one decoded fragment.
    ///
    /// Single-packet reports complete immediately. A duplicate packet index replaces the
    /// earlier fragment. A fragment arriving for a session that has already gone stale
    /// starts a fresh session.
    pub fn insert(&self, report: SensorReport, now: Instant) -> Assembly {
        if !report.is_fragment() {
            return Assembly::Complete(report);
        }

        let key = SessionKey::of(&report);
        let mut shard = self.shard(&key);

        let pending = match shard.entry(key) {
            Entry::Occupied(entry) => {
                let pending = entry.into_mut();
                if pending.is_stale(now, self.timeout) {
                    warn!(
                        device = %key.device,
                        session = %key.session,
                        received = pending.fragments.len(),
                        total = pending.total,
                        "Discarding stale reassembly session"
                    );
                    *pending = PendingAssembly::new(report.total_packets, now);
                }
                pending
            }
            Entry::Vacant(entry) => {
                debug!(device = %key.device, session = %key.session, total = report.total_packets, "Opening reassembly session");
                entry.insert(PendingAssembly::new(report.total_packets, now))
            }
        };

        if pending.total != report.total_packets {
            warn!(
                device = %key.device,
                session = %key.session,
                expected = pending.total,
                found = report.total_packets,
                "Dropping fragment with inconsistent packet count"
            );
            return Assembly::Rejected { expected_total: pending.total, found_total: report.total_packets };
        }

        let index = report.packet_index;
        let total = pending.total;
        if pending.fragments.insert(index, report).is_some() {
            debug!(device = %key.device, session = %key.session, index, "Replaced duplicate fragment");
        }

        if !pending.is_complete() {
            return Assembly::Pending { received: pending.fragments.len(), total: pending.total };
        }

        let Some(merged) = shard.remove(&key).and_then(PendingAssembly::merge) else {
            return Assembly::Pending { received: 0, total };
        };
        debug!(
            device = %key.device,
            session = %key.session,
            sensors = merged.sensors.len(),
            "Reassembled sensor report"
        );
        Assembly::Complete(merged)
    }

    /// Drop every session whose first fragment is older than the timeout.
    ///
    /// Returns the number of sessions discarded.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let mut purged = 0;
        for shard in self.shards.iter() {
            let mut sessions = shard.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.retain(|key, pending| {
                if !pending.is_stale(now, self.timeout) {
                    return true;
                }
                warn!(
                    device = %key.device,
                    session = %key.session,
                    received = pending.fragments.len(),
                    total = pending.total,
                    "Reassembly session timed out incomplete"
                );
                purged += 1;
                false
            });
        }
        purged
    }

    /// Number of sessions still waiting for fragments.
    pub fn pending_sessions(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len()).sum()
    }
}
