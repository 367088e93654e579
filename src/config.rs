//! Server configuration.
//!
//! Only three settings are read from the YAML file: `port`, `capacity` and
//! `reassembly_timeout_secs`. Every key is optional and unknown keys are rejected:
//!
//! ```yaml
//! port: 18160
//! capacity: 1000
//! reassembly_timeout_secs: 30
//! ```
//!
//! Protocol tuning that operators should not need to touch lives in [`ProtocolOptions`]
//! and is set in code.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::protocol::{ChecksumMode, FramingOptions, LENGTH_BASE, STATUS_FIXED_LEN};
use crate::{IngestError, Result};

pub const DEFAULT_PORT: u16 = 18160;
pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_REASSEMBLY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BEACON_CAPACITY: usize = 10_000;
pub const DEFAULT_LIVE_FEED_CAPACITY: usize = 256;

/// Largest frame the 16-bit length field can describe.
const MAX_WIRE_FRAME_LEN: usize = LENGTH_BASE + u16::MAX as usize;

/// Externally configurable settings plus programmatic protocol options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// TCP port devices connect to.
    pub port: u16,
    /// Records retained by the record store.
    pub capacity: usize,
    /// Seconds an incomplete multi-packet scan may wait for missing packets.
    pub reassembly_timeout_secs: u64,
    /// Interface to listen on.
    #[serde(skip, default = "unspecified_ip")]
    pub bind_ip: IpAddr,
    #[serde(skip)]
    pub protocol: ProtocolOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            reassembly_timeout_secs: DEFAULT_REASSEMBLY_TIMEOUT_SECS,
            bind_ip: unspecified_ip(),
            protocol: ProtocolOptions::default(),
        }
    }
}

fn unspecified_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Protocol behavior that is not part of the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolOptions {
    pub framing: FramingOptions,
    /// Echo the frame prefix back to the device after each accepted frame.
    pub acknowledge: bool,
    /// Close connections that send nothing for this long.
    pub idle_timeout: Duration,
    /// Tracked-tag sightings retained.
    pub beacon_capacity: usize,
    /// Records buffered per live-feed subscriber before it starts skipping.
    pub live_feed_capacity: usize,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            framing: FramingOptions::default(),
            acknowledge: true,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            beacon_capacity: DEFAULT_BEACON_CAPACITY,
            live_feed_capacity: DEFAULT_LIVE_FEED_CAPACITY,
        }
    }
}

impl Config {
    /// Parse and validate a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config =
            if yaml.trim().is_empty() { Config::default() } else { serde_yaml_ng::from_str(yaml)? };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| IngestError::ConfigFile { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded configuration file");
        Self::from_yaml_str(&yaml)
    }

    /// Check value ranges. Port 0 is accepted and binds an ephemeral port.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(IngestError::config("capacity must be at least 1"));
        }
        if self.reassembly_timeout_secs == 0 {
            return Err(IngestError::config("reassembly_timeout_secs must be at least 1"));
        }

        let protocol = &self.protocol;
        let min_frame = STATUS_FIXED_LEN + protocol.framing.checksum.trailer_len();
        if protocol.framing.max_frame_len < min_frame
            || protocol.framing.max_frame_len > MAX_WIRE_FRAME_LEN
        {
            return Err(IngestError::config(format!(
                "max_frame_len {} outside {}..={}",
                protocol.framing.max_frame_len, min_frame, MAX_WIRE_FRAME_LEN
            )));
        }
        if protocol.idle_timeout.is_zero() {
            return Err(IngestError::config("idle_timeout must be positive"));
        }
        if protocol.beacon_capacity == 0 || protocol.live_feed_capacity == 0 {
            return Err(IngestError::config("beacon and live feed capacities must be at least 1"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_secs(self.reassembly_timeout_secs)
    }

    /// Defaults bound to an ephemeral loopback port.
    pub fn loopback() -> Self {
        Self { port: 0, bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST), ..Self::default() }
    }

    /// Accept frames without a checksum trailer.
    pub fn without_checksum(mut self) -> Self {
        self.protocol.framing.checksum = ChecksumMode::None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorScope;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 18160);
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.reassembly_timeout(), Duration::from_secs(30));
        assert_eq!(config.protocol.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.protocol.framing.max_frame_len, 2048);
        assert_eq!(config.protocol.framing.checksum, ChecksumMode::Xor);
        assert!(config.protocol.acknowledge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_only_given_keys() {
        let config = Config::from_yaml_str("port: 9000\ncapacity: 50\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.capacity, 50);
        assert_eq!(config.reassembly_timeout_secs, 30);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml_str("  \n").unwrap(), Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = Config::from_yaml_str("port: 9000\nchecksum: none\n").unwrap_err();
        assert!(matches!(error, IngestError::ConfigParse(_)));
        assert_eq!(error.scope(), ErrorScope::Process);
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let error = Config::from_yaml_str("capacity: 0").unwrap_err();
        assert!(matches!(error, IngestError::Config { .. }));
        assert!(error.to_string().contains("capacity"));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        assert!(Config::from_yaml_str("reassembly_timeout_secs: 0").is_err());
    }

    #[test]
    fn programmatic_limits_are_validated() {
        let mut config = Config::default();
        config.protocol.framing.max_frame_len = 10;
        assert!(config.validate().is_err());

        config.protocol.framing.max_frame_len = 70_000;
        assert!(config.validate().is_err());

        config.protocol.framing.max_frame_len = 4096;
        config.protocol.idle_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let error = Config::load("/nonexistent/suntrack.yaml").unwrap_err();
        match error {
            IngestError::ConfigFile { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/suntrack.yaml"));
            }
            other => panic!("Expected ConfigFile error, got {:?}", other),
        }
    }

    #[test]
    fn loopback_binds_ephemeral_port() {
        let config = Config::loopback();
        assert_eq!(config.listen_addr(), "127.0.0.1:0".parse().unwrap());
    }
}
