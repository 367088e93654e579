//! Ingestion server and protocol decoder for Suntech GPS/BLE tracker telemetry.
//!
//! Trackers hold a long-lived TCP connection and stream binary frames: periodic status
//! reports with position, cell and I/O state, and BLE scan reports that may be split
//! across several frames. This crate accepts those connections, frames and decodes the
//! byte stream, reassembles split scans and keeps the most recent records in a bounded
//! in-memory store for a display layer to poll.
//!
//! # Features
//!
//! - **Framing**: resynchronizing stream codec with checksum and length limits
//! - **Decoding**: bounds-checked, allocation-light decoding into typed reports
//! - **Reassembly**: order-independent merging of multi-packet scans with staleness expiry
//! - **Retention**: lock-scoped FIFO record store with point-in-time snapshots
//!
//! # Architecture
//!
//! ```text
//! device ─TCP─▶ Server ─▶ connection task ─▶ FrameCodec ─▶ decode ─┬─▶ RecordStore
//!                                                                  └─▶ ReassemblyTracker ─▶ RecordStore
//! ```
//!
//! ## Example (decode a captured frame)
//!
//! ```rust
//! use suntrack::protocol::{RawFrame, decode};
//! use suntrack::types::DecodedMessage;
//!
//! # fn hex(s: &str) -> Vec<u8> {
//! #     (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap()).collect()
//! # }
//! let bytes = hex("aa001a1990000910007fffc701010c0101010000190b1315340f02edf43c874f5a2a");
//! let message = decode(&RawFrame::without_trailer(bytes))?;
//! assert!(matches!(message, DecodedMessage::SensorReport(_)));
//! assert_eq!(message.device().to_string(), "1990000910");
//! # Ok::<(), suntrack::DecodeError>(())
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod config;
pub mod pipeline;
pub mod protocol;
pub mod reassembly;
pub mod server;
pub mod store;

// Core exports
pub use error::*;

// Main API exports
pub use config::{Config, ProtocolOptions};
pub use pipeline::{IngestOutcome, IngestStats, Pipeline};
pub use protocol::{ChecksumMode, FrameCodec, RawFrame, decode};
pub use reassembly::{Assembly, ReassemblyTracker};
pub use server::{Server, ServerHandle};
pub use store::{RecordStore, Snapshot};
