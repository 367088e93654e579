//! Test utilities: frame builders and captured device traffic
//!
//! Builders produce complete wire frames with a correct packet length and, unless
//! disabled, a valid XOR trailer. Captured frames come from a production tracker that
//! sends no trailer, so they are wrapped with [`RawFrame::without_trailer`].

#![cfg(any(test, feature = "benchmark"))]

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{
    FrameCodec, HEADER_SENSOR, HEADER_STATUS, LENGTH_BASE, RawFrame, decode, xor_checksum,
};
use crate::types::{DecodedMessage, MacAddress, SensorReport};

/// Packet 2 of a 2-packet scan, three tracked tags.
pub const CAPTURE_PACKET_2_OF_2: &str = "aa00851990000910007fffc701010c0102020003190b1315340f02edf43c874f5a2a1a1a1f0201060303e1ff1216e1ffa108649519293f23ac566563696d610201060303e1ff1216e1ffa10864052b5e3f23ac566563696d610201061bff3906ca1a018e3c2b5ec8052b5eca951929eda9aa75c22c5219dcac233f291995ac233f5e2b05c3000040089dcbbfca";

/// Packet 1 of the same scan, six sensors.
pub const CAPTURE_PACKET_1_OF_2: &str = "aa00e51990000910007fffc701010c0102010006190b1315340f02edf43c874f5a2a1a1a1a1a191a0201060303e1ff1216e1ffa10864a9aa753f23ac566563696d610201060303e1ff1216e1ffa108643c2b5e3f23ac566563696d610201060303e1ff1216e1ffa10864efa7753f23ac566563696d610201060303e1ff1216e1ffa10864acc5f23f23ac566563696d610201060303e1ff1116e1ffa10864739d410000c34d544230370201060303e1ff1216e1ffa1086421d8060000c3566563696d61ac233f75aaa9ac233f5e2b3cac233f75a7efac233ff2c5acc30000419d73c3000006d821b6c1bcbbbbb8";

/// Packet 2 of a later scan from the same device, whose packet 1 was never captured.
pub const CAPTURE_OTHER_SESSION: &str = "aa00851990000910007fffc701010c0102020003190b1317390f02edf43c874f5a2a1a1a1f0201060303e1ff1216e1ffa108643c2b5e3f23ac566563696d610201060303e1ff1216e1ffa10864efa7753f23ac566563696d610201061bff3906ca1a01e2951929ec052b5eca3c2b5ecaefa775c84f4f8167ac233f5e2b3cac233f75a7efc3000040089dbbb5c4";

/// Decode a hex string. Panics on malformed input.
pub fn hex_bytes(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "odd-length hex string");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("valid hex"))
        .collect()
}

/// A captured frame, which carries no checksum trailer.
pub fn capture_frame(hex: &str) -> RawFrame {
    RawFrame::without_trailer(hex_bytes(hex))
}

/// Append the XOR trailer to a frame whose packet length already counts it.
fn finish(mut frame: Vec<u8>, checksum: bool) -> Vec<u8> {
    let total = frame.len() + usize::from(checksum);
    let declared = u16::try_from(total - LENGTH_BASE).expect("test frame fits u16 length");
    frame[1..3].copy_from_slice(&declared.to_be_bytes());
    if checksum {
        let trailer = xor_checksum(&frame);
        frame.push(trailer);
    }
    frame
}

/// Builder for status report (`0x81`) frames.
#[derive(Debug, Clone)]
pub struct StatusFrameBuilder {
    device: [u8; 5],
    timestamp: [u8; 6],
    lat: u32,
    lon: u32,
    speed: u16,
    course: u16,
    satellites: u8,
    fix: u8,
    inputs: u8,
    outputs: u8,
    message_number: u16,
    extension: Vec<u8>,
    checksum: bool,
}

impl Default for StatusFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusFrameBuilder {
    pub fn new() -> Self {
        Self {
            device: [0x19, 0x90, 0x00, 0x09, 0x10],
            timestamp: [25, 11, 19, 21, 52, 15],
            lat: 0x02ED_F43C,
            lon: 0x874F_5A2A,
            speed: 0,
            course: 0,
            satellites: 7,
            fix: 1,
            inputs: 0,
            outputs: 0,
            message_number: 1,
            extension: Vec::new(),
            checksum: true,
        }
    }

    pub fn device_bcd(mut self, device: [u8; 5]) -> Self {
        self.device = device;
        self
    }

    pub fn timestamp(mut self, timestamp: [u8; 6]) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Raw sign-magnitude coordinate words.
    pub fn position(mut self, lat: u32, lon: u32) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    pub fn speed(mut self, centi_kmh: u16) -> Self {
        self.speed = centi_kmh;
        self
    }

    pub fn course(mut self, centi_deg: u16) -> Self {
        self.course = centi_deg;
        self
    }

    pub fn satellites(mut self, satellites: u8) -> Self {
        self.satellites = satellites;
        self
    }

    pub fn fix(mut self, fix: u8) -> Self {
        self.fix = fix;
        self
    }

    pub fn io(mut self, inputs: u8, outputs: u8) -> Self {
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }

    pub fn message_number(mut self, message_number: u16) -> Self {
        self.message_number = message_number;
        self
    }

    pub fn extension(mut self, extension: &[u8]) -> Self {
        self.extension = extension.to_vec();
        self
    }

    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = vec![HEADER_STATUS, 0, 0];
        frame.extend_from_slice(&self.device);
        frame.extend_from_slice(&[0x00, 0x7F, 0xFF]); // report map
        frame.push(0xC7); // model
        frame.extend_from_slice(&[0x01, 0x01, 0x0C]); // 1.1.12
        frame.push(0x01); // real-time
        frame.extend_from_slice(&self.timestamp);
        frame.extend_from_slice(&0x0001_A2B3u32.to_be_bytes()); // cell id
        frame.extend_from_slice(&[0x03, 0x02]); // mcc 302
        frame.extend_from_slice(&[0x07, 0x20]); // mnc 720
        frame.extend_from_slice(&0x1234u16.to_be_bytes()); // lac
        frame.push(0x1F); // rx level
        frame.extend_from_slice(&self.lat.to_be_bytes());
        frame.extend_from_slice(&self.lon.to_be_bytes());
        frame.extend_from_slice(&self.speed.to_be_bytes());
        frame.extend_from_slice(&self.course.to_be_bytes());
        frame.push(self.satellites);
        frame.push(self.fix);
        frame.push(self.inputs);
        frame.push(self.outputs);
        frame.push(0x01); // driving
        frame.push(0x01); // report type
        frame.extend_from_slice(&self.message_number.to_be_bytes());
        frame.push(0x00); // reserved
        frame.extend_from_slice(&0x0000_0000u32.to_be_bytes()); // assign map
        frame.extend_from_slice(&self.extension);
        finish(frame, self.checksum)
    }
}

/// One sensor entry for [`SensorFrameBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSensor {
    pub mac: [u8; 6],
    pub rssi: i8,
    pub advertisement: Vec<u8>,
}

impl TestSensor {
    pub fn new(mac: [u8; 6], rssi: i8, advertisement: &[u8]) -> Self {
        Self { mac, rssi, advertisement: advertisement.to_vec() }
    }

    /// A tracked tag (`AC:23:3F` prefix) numbered by `serial`.
    pub fn tag(serial: u32, rssi: i8) -> Self {
        let [_, a, b, c] = serial.to_be_bytes();
        Self::new([0xAC, 0x23, 0x3F, a, b, c], rssi, &[0x02, 0x01, 0x06, 0x03, 0x03, 0xE1, 0xFF])
    }

    /// An advertiser outside the tracked fleet.
    pub fn foreign(serial: u32, rssi: i8) -> Self {
        let [_, a, b, c] = serial.to_be_bytes();
        Self::new([0x4D, 0x54, 0x42, a, b, c], rssi, &[0x02, 0x01, 0x06])
    }
}

/// Builder for BLE sensor report (`0xAA`) frames.
#[derive(Debug, Clone)]
pub struct SensorFrameBuilder {
    device: [u8; 5],
    scan_status: u8,
    index: u8,
    total: u8,
    scan_time: [u8; 6],
    lat: u32,
    lon: u32,
    sensors: Vec<TestSensor>,
    declared_count: Option<u16>,
    checksum: bool,
}

impl Default for SensorFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorFrameBuilder {
    pub fn new() -> Self {
        Self {
            device: [0x19, 0x90, 0x00, 0x09, 0x10],
            scan_status: 1,
            index: 1,
            total: 1,
            scan_time: [25, 11, 19, 21, 52, 15],
            lat: 0x02ED_F43C,
            lon: 0x874F_5A2A,
            sensors: Vec::new(),
            declared_count: None,
            checksum: true,
        }
    }

    pub fn device_bcd(mut self, device: [u8; 5]) -> Self {
        self.device = device;
        self
    }

    pub fn scan_status(mut self, status: u8) -> Self {
        self.scan_status = status;
        self
    }

    pub fn fragment(mut self, index: u8, total: u8) -> Self {
        self.index = index;
        self.total = total;
        self
    }

    pub fn scan_time(mut self, scan_time: [u8; 6]) -> Self {
        self.scan_time = scan_time;
        self
    }

    pub fn scan_position(mut self, lat: u32, lon: u32) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    pub fn sensor(mut self, sensor: TestSensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn sensors(mut self, sensors: impl IntoIterator<Item = TestSensor>) -> Self {
        self.sensors.extend(sensors);
        self
    }

    /// Override the sensor count field to produce an inconsistent frame.
    pub fn declared_count(mut self, count: u16) -> Self {
        self.declared_count = Some(count);
        self
    }

    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let count = self.declared_count.unwrap_or(self.sensors.len() as u16);

        let mut frame = vec![HEADER_SENSOR, 0, 0];
        frame.extend_from_slice(&self.device);
        frame.extend_from_slice(&[0x00, 0x7F, 0xFF]);
        frame.push(0xC7);
        frame.extend_from_slice(&[0x01, 0x01, 0x0C]);
        frame.push(self.scan_status);
        frame.push(self.total);
        frame.push(self.index);
        frame.extend_from_slice(&count.to_be_bytes());
        frame.extend_from_slice(&self.scan_time);
        frame.extend_from_slice(&self.lat.to_be_bytes());
        frame.extend_from_slice(&self.lon.to_be_bytes());
        for sensor in &self.sensors {
            frame.push(sensor.advertisement.len() as u8);
        }
        for sensor in &self.sensors {
            frame.extend_from_slice(&sensor.advertisement);
        }
        for sensor in &self.sensors {
            frame.extend_from_slice(&sensor.mac);
        }
        for sensor in &self.sensors {
            frame.push(sensor.rssi as u8);
        }
        finish(frame, self.checksum)
    }
}

/// Wire frames for one scan split into `total` packets of `per_packet` tags each.
///
/// Tags are numbered consecutively across packets, so a correct reassembly yields serials
/// `0..total * per_packet` in order.
pub fn scan_fragments(scan_time: [u8; 6], total: u8, per_packet: usize) -> Vec<Vec<u8>> {
    (1..=total)
        .map(|index| {
            let first = (usize::from(index) - 1) * per_packet;
            SensorFrameBuilder::new()
                .scan_time(scan_time)
                .fragment(index, total)
                .sensors((first..first + per_packet).map(|serial| TestSensor::tag(serial as u32, -60)))
                .build()
        })
        .collect()
}

/// Run builder output through a default [`FrameCodec`]. Panics unless exactly one frame results.
pub fn checked_frame(wire: &[u8]) -> RawFrame {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(wire);
    let frame = codec.decode(&mut buf).expect("codec never fails").expect("complete frame");
    assert!(buf.is_empty(), "trailing bytes after frame");
    frame
}

/// Decode a builder frame into a sensor report. Panics when the frame is not one.
pub fn decoded_sensor_report(wire: &[u8]) -> SensorReport {
    match decode(&checked_frame(wire)).expect("builder frame decodes") {
        DecodedMessage::SensorReport(report) => report,
        other => panic!("Expected sensor report, got {:?}", other),
    }
}

/// Tracked-tag serial carried in the last three MAC bytes.
pub fn tag_serial(mac: &MacAddress) -> u32 {
    let [.., a, b, c] = mac.0;
    u32::from_be_bytes([0, a, b, c])
}
