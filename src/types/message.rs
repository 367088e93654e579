//! Decoded message envelope and stored record types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;

use super::{DeviceId, MacAddress, SensorReport, StatusReport};

/// A fully decoded, fully reassembled device message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DecodedMessage {
    StatusReport(StatusReport),
    SensorReport(SensorReport),
}

impl DecodedMessage {
    /// Device that produced the message.
    pub fn device(&self) -> DeviceId {
        match self {
            DecodedMessage::StatusReport(report) => report.device,
            DecodedMessage::SensorReport(report) => report.device,
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedMessage::StatusReport(_) => "STT",
            DecodedMessage::SensorReport(_) => "BDA",
        }
    }
}

/// A message as retained by the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Server receive time of the frame that completed the message.
    pub received_at: DateTime<Utc>,
    /// Connection the completing frame arrived on.
    pub peer: Option<SocketAddr>,
    pub message: DecodedMessage,
}

impl Record {
    pub fn new(message: DecodedMessage, peer: Option<SocketAddr>) -> Self {
        Self { received_at: Utc::now(), peer, message }
    }
}

/// One observation of a tracked tag by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeaconSighting {
    pub seen_at: DateTime<Utc>,
    pub device: DeviceId,
    pub mac: MacAddress,
    pub rssi: i8,
}

impl BeaconSighting {
    /// Sightings for every tracked tag in a sensor report.
    pub fn from_report(report: &SensorReport, seen_at: DateTime<Utc>) -> Vec<Self> {
        report
            .tracked_tags()
            .map(|sensor| Self { seen_at, device: report.device, mac: sensor.mac, rssi: sensor.rssi })
            .collect()
    }
}
