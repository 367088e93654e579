//! Device identity fields shared by every report variant

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;

/// Decode packed BCD into an integer.
///
/// Each byte carries two decimal digits. When any nibble is not a decimal digit the bytes
/// are read as a plain big-endian integer instead, which is how devices with hexadecimal
/// serials report themselves.
pub fn decode_bcd(bytes: &[u8]) -> u64 {
    let is_bcd = bytes.iter().all(|b| (b >> 4) <= 9 && (b & 0x0F) <= 9);
    if is_bcd {
        bytes.iter().fold(0u64, |acc, b| acc * 100 + u64::from(b >> 4) * 10 + u64::from(b & 0x0F))
    } else {
        bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }
}

/// Device serial number (ESN) carried in the common report prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Decode the 5-byte packed-BCD identifier field.
    pub fn from_bcd(bytes: &[u8]) -> Self {
        Self(decode_bcd(bytes))
    }

    /// Raw numeric identifier.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Firmware version reported as three binary components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl SoftwareVersion {
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self { major: bytes[0], minor: bytes[1], patch: bytes[2] }
    }
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for SoftwareVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decode the 6-byte binary `YY MM DD HH MM SS` device clock.
///
/// Returns `None` for values that are not a real calendar instant, which devices send
/// before their first GPS time sync.
pub fn decode_device_time(bytes: [u8; 6]) -> Option<NaiveDateTime> {
    let [yy, mo, dd, hh, mi, ss] = bytes;
    NaiveDate::from_ymd_opt(2000 + i32::from(yy), u32::from(mo), u32::from(dd))?.and_hms_opt(
        u32::from(hh),
        u32::from(mi),
        u32::from(ss),
    )
}
