//! Status report (STT) types

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::{DeviceId, IoState, Position, SoftwareVersion};

/// Whether a report was produced live or replayed from device storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Stored,
    RealTime,
}

impl MessageKind {
    pub fn from_raw(raw: u8) -> Self {
        if raw == 1 { MessageKind::RealTime } else { MessageKind::Stored }
    }
}

/// GPS fix state at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixStatus {
    NotFixed,
    Fixed,
    DeadReckoning,
    Unknown(u8),
}

impl FixStatus {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => FixStatus::NotFixed,
            1 => FixStatus::Fixed,
            3 => FixStatus::DeadReckoning,
            other => FixStatus::Unknown(other),
        }
    }

    /// Only a true satellite fix counts as a valid position.
    pub fn is_valid(&self) -> bool {
        matches!(self, FixStatus::Fixed)
    }
}

/// Device operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceMode {
    Driving,
    DeactivateZone,
    Other(u8),
}

impl DeviceMode {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => DeviceMode::Driving,
            5 => DeviceMode::DeactivateZone,
            other => DeviceMode::Other(other),
        }
    }
}

/// Serving cell identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellInfo {
    pub cell_id: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub rx_level: u8,
}

/// Periodic position and status report (header `0x81`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub device: DeviceId,
    pub report_map: u32,
    pub model: u8,
    pub software: SoftwareVersion,
    pub kind: MessageKind,
    /// Device clock in UTC, `None` before the first time sync.
    pub timestamp: Option<NaiveDateTime>,
    pub cell: CellInfo,
    pub position: Position,
    /// Speed in hundredths of km/h.
    pub speed_centi_kmh: u16,
    /// Course over ground in hundredths of a degree.
    pub course_centi_deg: u16,
    pub satellites: u8,
    pub fix: FixStatus,
    pub inputs: IoState,
    pub outputs: IoState,
    pub mode: DeviceMode,
    pub report_type: u8,
    pub message_number: u16,
    pub assign_map: u32,
    /// Custom assign-map fields following the fixed layout, kept undecoded.
    #[serde(serialize_with = "serialize_hex")]
    pub extension: Bytes,
}

impl StatusReport {
    /// Speed in km/h.
    pub fn speed_kmh(&self) -> f64 {
        f64::from(self.speed_centi_kmh) / 100.0
    }

    /// Course over ground in degrees.
    pub fn course_deg(&self) -> f64 {
        f64::from(self.course_centi_deg) / 100.0
    }

    /// Whether the reported position comes from a valid GPS fix.
    pub fn gps_fixed(&self) -> bool {
        self.fix.is_valid()
    }
}

pub(crate) fn serialize_hex<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    serializer.serialize_str(&hex)
}
