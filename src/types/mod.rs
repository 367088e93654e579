//! Core types for decoded tracker telemetry.
//!
//! This module provides the typed form of every message the protocol decoder produces.
//!
//! ## Architecture
//!
//! The type system mirrors the device protocol:
//! - [`DecodedMessage`] is the tagged union over the two report families
//! - [`StatusReport`] carries position, cellular and I/O state (header `0x81`)
//! - [`SensorReport`] carries BLE scan results (header `0xAA`), possibly fragmented
//! - [`Record`] wraps a message with receive metadata for the record store
//! - [`BeaconSighting`] is one observation of a tracked tag
//!
//! All types are immutable values; nothing here performs I/O.
//!
//! ## Usage Example
//!
//! ```rust
//! use suntrack::types::{IoState, Position};
//!
//! let position = Position::from_wire(31_230_000, 121_470_000);
//! assert_eq!(position.latitude(), 31.23);
//!
//! let inputs = IoState::new(0b0000_0010);
//! assert!(inputs.is_active(2));
//! ```

mod device;
mod io_state;
mod message;
mod position;
mod sensor;
mod status;

pub use device::{DeviceId, SoftwareVersion, decode_bcd, decode_device_time};
pub use io_state::IoState;
pub use message::{BeaconSighting, DecodedMessage, Record};
pub use position::Position;
pub use sensor::{AdStructure, AdStructures, MacAddress, SensorRecord, SensorReport, SessionId};
pub use status::{CellInfo, DeviceMode, FixStatus, MessageKind, StatusReport};
