//! Suntech binary protocol: framing and decoding.
//!
//! ## Frame Structure
//!
//! ```text
//! [HDR (1)] [PKT_LEN (2, BE)] [DEV_ID (5, BCD)] [variant body ...] [CHECKSUM (1, optional)]
//! ```
//!
//! - `HDR` doubles as the start marker: `0x81` for status reports, `0xAA` for BLE sensor
//!   reports.
//! - `PKT_LEN` counts every byte after the device identifier, so a frame is always
//!   `8 + PKT_LEN` bytes long.
//! - `CHECKSUM` is the XOR of all preceding frame bytes when enabled.
//!
//! [`FrameCodec`] turns a byte stream into [`RawFrame`]s and [`decode`] turns a frame into a
//! [`DecodedMessage`](crate::types::DecodedMessage).

mod decode;
mod frame;

pub use decode::decode;
pub use frame::{
    Acknowledgment, ChecksumMode, FrameCodec, FramingOptions, FramingStats, RawFrame,
    xor_checksum,
};

/// Header discriminator for status reports (STT).
pub const HEADER_STATUS: u8 = 0x81;

/// Header discriminator for BLE sensor reports (BDA/SNB).
pub const HEADER_SENSOR: u8 = 0xAA;

/// Frame bytes not counted by the packet length field (header, length, device id).
pub const LENGTH_BASE: usize = 8;

/// Common prefix shared by both variants.
pub const COMMON_PREFIX_LEN: usize = 15;

/// Fixed part of a status report, before any assign-map extension.
pub const STATUS_FIXED_LEN: usize = 58;

/// Fixed part of a sensor report, before the per-sensor tables.
pub const SENSOR_FIXED_LEN: usize = 34;

/// Bytes per sensor outside the advertisement payload (length byte, MAC, RSSI).
pub const SENSOR_ENTRY_OVERHEAD: usize = 1 + 6 + 1;

/// Default hard limit on a single frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 2048;

/// Acknowledgments echo the frame prefix up to and including the device id.
pub const ACK_LEN: usize = LENGTH_BASE;

/// Whether a byte can start a frame.
pub fn is_start_marker(byte: u8) -> bool {
    byte == HEADER_STATUS || byte == HEADER_SENSOR
}

/// Smallest valid frame body for a discriminator, excluding any checksum trailer.
pub fn min_body_len(header: u8) -> Option<usize> {
    match header {
        HEADER_STATUS => Some(STATUS_FIXED_LEN),
        HEADER_SENSOR => Some(SENSOR_FIXED_LEN),
        _ => None,
    }
}
