//! BLE sensor report (BDA/SNB) types

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

use super::status::serialize_hex;
use super::{DeviceId, Position, SoftwareVersion};

/// Bluetooth device address in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Tags deployed with the tracker fleet: `AC:23:3F:..` and `C3:00:0x:..`.
    pub fn is_tracked_tag(&self) -> bool {
        let [a, b, c, ..] = self.0;
        (a, b, c) == (0xAC, 0x23, 0x3F) || (a == 0xC3 && b == 0x00 && c >> 4 == 0)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Groups the fragments of one scan.
///
/// Every fragment of a multi-packet scan repeats the raw 6-byte scan timestamp, so those
/// bytes identify the session even when the clock was never synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn from_scan_time(bytes: [u8; 6]) -> Self {
        Self(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.0)
    }
}

/// One scanned BLE advertiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorRecord {
    pub mac: MacAddress,
    /// Received signal strength in dBm.
    pub rssi: i8,
    /// Scan position of the packet that reported this sensor.
    pub location: Option<Position>,
    #[serde(serialize_with = "serialize_hex")]
    pub advertisement: Bytes,
}

impl SensorRecord {
    /// Iterate the AD structures of the raw advertisement payload.
    pub fn ad_structures(&self) -> AdStructures<'_> {
        AdStructures { remaining: &self.advertisement }
    }

    pub fn is_tracked_tag(&self) -> bool {
        self.mac.is_tracked_tag()
    }
}

/// A single `length | type | data` element of a BLE advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over AD structures. Stops at the first zero length or truncated element.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.remaining.split_first()?;
        let len = usize::from(len);
        if len == 0 || rest.len() < len {
            self.remaining = &[];
            return None;
        }
        let (element, tail) = rest.split_at(len);
        self.remaining = tail;
        Some(AdStructure { ad_type: element[0], data: &element[1..] })
    }
}

/// BLE scan results (header `0xAA`), possibly one fragment of a larger scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReport {
    pub device: DeviceId,
    pub report_map: u32,
    pub model: u8,
    pub software: SoftwareVersion,
    pub session: SessionId,
    /// Scan start time in UTC, `None` before the first time sync.
    pub timestamp: Option<NaiveDateTime>,
    pub scan_performed: bool,
    /// Scan start position, `None` when the device had no location.
    pub scan_position: Option<Position>,
    /// 1-based packet index. A reassembled report carries the first packet's index.
    pub packet_index: u8,
    pub total_packets: u8,
    pub sensors: Vec<SensorRecord>,
}

impl SensorReport {
    /// Number of sensors carried by this report.
    pub fn scanned_sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Whether this report needs other packets before it is complete.
    pub fn is_fragment(&self) -> bool {
        self.total_packets > 1
    }

    /// Sensors whose address belongs to the tracked tag fleet.
    pub fn tracked_tags(&self) -> impl Iterator<Item = &SensorRecord> {
        self.sensors.iter().filter(|sensor| sensor.is_tracked_tag())
    }
}
