//! Error types for telemetry ingestion.
//!
//! Errors are split by the unit of work they can damage:
//!
//! - [`DecodeError`]: one frame could not be turned into a typed message. The frame is
//!   dropped and the connection keeps reading.
//! - [`FramingError`]: bytes on the wire did not form a valid frame. These never leave the
//!   frame reader; they are logged and counted while the reader resynchronizes.
//! - [`IngestError`]: everything above the frame level (sockets, configuration) plus a
//!   wrapper for decode failures so the pipeline has one error type.
//!
//! ## Scope
//!
//! Every error reports the smallest [`ErrorScope`] it affects, which lets callers confirm
//! that a failure stays local:
//!
//! ```rust
//! use suntrack::{DecodeError, ErrorScope, IngestError};
//!
//! let error = IngestError::from(DecodeError::UnknownHeader { header: 0x42 });
//! assert_eq!(error.scope(), ErrorScope::Frame);
//! assert!(!error.is_fatal());
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// The smallest unit of work an error is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorScope {
    /// A single frame is discarded.
    Frame,
    /// A single reassembly session is discarded.
    Session,
    /// A single device connection is closed.
    Connection,
    /// The process cannot start or keep listening.
    Process,
}

/// Failure to decode one validated frame into a typed message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unknown header discriminator {header:#04x}")]
    UnknownHeader { header: u8 },

    #[error("frame truncated reading {field} at offset {offset}: need {needed} bytes, have {available}")]
    Truncated { field: &'static str, offset: usize, needed: usize, available: usize },

    #[error("packet length field declares {declared} bytes but frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("sensor count {count} implies {expected} body bytes, frame has {actual}")]
    CountMismatch { count: u16, expected: usize, actual: usize },

    #[error("packet index {index} out of range for {total} total packets")]
    FragmentIndex { index: u8, total: u8 },
}

impl DecodeError {
    /// Helper constructor for truncated field errors.
    pub fn truncated(field: &'static str, offset: usize, needed: usize, available: usize) -> Self {
        DecodeError::Truncated { field, offset, needed, available }
    }
}

/// Byte-level framing problems found while scanning the stream.
///
/// The frame reader reports these through logs and counters only; the offending bytes are
/// skipped and reading continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FramingError {
    #[error("declared frame length {declared} exceeds maximum {max}")]
    Oversized { declared: usize, max: usize },

    #[error("declared frame length {declared} is below the {min}-byte minimum")]
    Undersized { declared: usize, min: usize },

    #[error("checksum mismatch: computed {computed:#04x}, frame carries {found:#04x}")]
    ChecksumMismatch { computed: u8, found: u8 },
}

/// Main error type for ingestion operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error{}", describe_peer(.peer))]
    Transport {
        peer: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    #[error("connection {peer} idle for longer than {idle:?}")]
    IdleTimeout { peer: SocketAddr, idle: std::time::Duration },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to read configuration file {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_yaml_ng::Error),
}

fn describe_peer(peer: &Option<SocketAddr>) -> String {
    peer.map(|addr| format!(" from {addr}")).unwrap_or_default()
}

impl IngestError {
    /// The smallest unit of work this error affects.
    pub fn scope(&self) -> ErrorScope {
        match self {
            IngestError::Decode(_) => ErrorScope::Frame,
            IngestError::Transport { .. } => ErrorScope::Connection,
            IngestError::IdleTimeout { .. } => ErrorScope::Connection,
            IngestError::Bind { .. } => ErrorScope::Process,
            IngestError::Config { .. } => ErrorScope::Process,
            IngestError::ConfigFile { .. } => ErrorScope::Process,
            IngestError::ConfigParse(_) => ErrorScope::Process,
        }
    }

    /// Whether the error prevents the server from running at all.
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Process
    }

    /// Helper constructor for transport errors tied to a peer.
    pub fn transport(peer: SocketAddr, source: std::io::Error) -> Self {
        IngestError::Transport { peer: Some(peer), source }
    }

    /// Helper constructor for configuration validation errors.
    pub fn config(reason: impl Into<String>) -> Self {
        IngestError::Config { reason: reason.into() }
    }
}

// The frame codec needs `From<io::Error>`; socket reads are always connection-scoped.
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Transport { peer: None, source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_errors_always_stay_frame_scoped(
                header in any::<u8>(),
                offset in 0usize..4096,
                needed in 1usize..64,
                count in any::<u16>(),
                index in any::<u8>(),
                total in any::<u8>(),
            ) {
                let variants = [
                    DecodeError::UnknownHeader { header },
                    DecodeError::truncated("latitude", offset, needed, offset),
                    DecodeError::CountMismatch { count, expected: offset + needed, actual: offset },
                    DecodeError::FragmentIndex { index, total },
                ];

                for variant in variants {
                    let message = variant.to_string();
                    prop_assert!(!message.is_empty());
                    let wrapped = IngestError::from(variant);
                    prop_assert_eq!(wrapped.scope(), ErrorScope::Frame);
                    prop_assert!(!wrapped.is_fatal());
                }
            }

            #[test]
            fn error_messages_carry_their_context(
                reason in ".*",
                header in any::<u8>(),
                computed in any::<u8>(),
                found in any::<u8>(),
            ) {
                let config = IngestError::config(reason.clone());
                prop_assert!(config.to_string().contains(&reason));

                let unknown = DecodeError::UnknownHeader { header };
                let header_hex = format!("{:#04x}", header);
                prop_assert!(unknown.to_string().contains(&header_hex));

                let checksum = FramingError::ChecksumMismatch { computed, found };
                let found_hex = format!("{:#04x}", found);
                prop_assert!(checksum.to_string().contains(&found_hex));
            }
        }
    }

    #[test]
    fn scopes_are_ordered_from_smallest_to_largest() {
        assert!(ErrorScope::Frame < ErrorScope::Session);
        assert!(ErrorScope::Session < ErrorScope::Connection);
        assert!(ErrorScope::Connection < ErrorScope::Process);
    }

    #[test]
    fn transport_and_timeout_errors_close_only_the_connection() {
        let peer: SocketAddr = "10.0.0.7:40210".parse().unwrap();
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");

        let transport = IngestError::transport(peer, reset);
        assert_eq!(transport.scope(), ErrorScope::Connection);
        assert!(transport.to_string().contains("10.0.0.7:40210"));

        let idle = IngestError::IdleTimeout { peer, idle: Duration::from_secs(60) };
        assert_eq!(idle.scope(), ErrorScope::Connection);
        assert!(!idle.is_fatal());
    }

    #[test]
    fn bind_and_config_errors_are_fatal() {
        let addr: SocketAddr = "0.0.0.0:18160".parse().unwrap();
        let in_use = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        assert!(IngestError::Bind { addr, source: in_use }.is_fatal());
        assert!(IngestError::config("capacity must be positive").is_fatal());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<IngestError>();
        assert_send_sync_static::<DecodeError>();

        let error = IngestError::config("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn io_errors_convert_to_transport() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        match IngestError::from(io_err) {
            IngestError::Transport { peer: None, source } => {
                assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }
}
