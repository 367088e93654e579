//! Frame body decoding into typed reports

use bytes::Bytes;
use tracing::trace;

use super::frame::RawFrame;
use super::{
    COMMON_PREFIX_LEN, HEADER_SENSOR, HEADER_STATUS, LENGTH_BASE, SENSOR_ENTRY_OVERHEAD,
    SENSOR_FIXED_LEN, STATUS_FIXED_LEN,
};
use crate::DecodeError;
use crate::types::{
    CellInfo, DecodedMessage, DeviceId, DeviceMode, FixStatus, IoState, MacAddress,
    MessageKind, Position, SensorRecord, SensorReport, SessionId, SoftwareVersion,
    StatusReport, decode_bcd, decode_device_time,
};

/// Decode one validated frame.
///
/// Pure function of the frame bytes. Fragments of a multi-packet sensor scan decode to
/// individual [`SensorReport`]s; joining them is the reassembly tracker's job.
pub fn decode(frame: &RawFrame) -> Result<DecodedMessage, DecodeError> {
    let body = frame.body();
    let header = body.first().copied().ok_or_else(|| DecodeError::truncated("header", 0, 1, 0))?;

    let declared = usize::from(parse_u16_be(&body, 1, "packet length")?);
    let on_wire = body.len() + frame.trailer_len();
    if declared + LENGTH_BASE != on_wire {
        return Err(DecodeError::LengthMismatch { declared: declared + LENGTH_BASE, actual: on_wire });
    }

    match header {
        HEADER_STATUS => decode_status(&body).map(DecodedMessage::StatusReport),
        HEADER_SENSOR => decode_sensor(&body).map(DecodedMessage::SensorReport),
        other => Err(DecodeError::UnknownHeader { header: other }),
    }
}

/// Fields shared by both report variants.
struct Prefix {
    device: DeviceId,
    report_map: u32,
    model: u8,
    software: SoftwareVersion,
}

fn decode_prefix(body: &[u8]) -> Result<Prefix, DecodeError> {
    ensure_len(body, COMMON_PREFIX_LEN, "common prefix")?;
    let device = DeviceId::from_bcd(&parse_array::<5>(body, 3, "device id")?);
    let [a, b, c] = parse_array::<3>(body, 8, "report map")?;
    let report_map = u32::from_be_bytes([0, a, b, c]);
    let model = parse_u8(body, 11, "model")?;
    let software = SoftwareVersion::from_bytes(parse_array::<3>(body, 12, "software version")?);
    Ok(Prefix { device, report_map, model, software })
}

fn decode_status(body: &Bytes) -> Result<StatusReport, DecodeError> {
    ensure_len(body, STATUS_FIXED_LEN, "status report")?;
    let prefix = decode_prefix(body)?;

    let [yy, mo, dd] = parse_array::<3>(body, 16, "date")?;
    let [hh, mi, ss] = parse_array::<3>(body, 19, "time")?;

    let cell = CellInfo {
        cell_id: parse_u32_be(body, 22, "cell id")?,
        mcc: decode_bcd(&parse_array::<2>(body, 26, "mcc")?) as u16,
        mnc: decode_bcd(&parse_array::<2>(body, 28, "mnc")?) as u16,
        lac: parse_u16_be(body, 30, "lac")?,
        rx_level: parse_u8(body, 32, "rx level")?,
    };

    let position =
        Position::from_wire(parse_u32_be(body, 33, "latitude")?, parse_u32_be(body, 37, "longitude")?);

    let report = StatusReport {
        device: prefix.device,
        report_map: prefix.report_map,
        model: prefix.model,
        software: prefix.software,
        kind: MessageKind::from_raw(parse_u8(body, 15, "message kind")?),
        timestamp: decode_device_time([yy, mo, dd, hh, mi, ss]),
        cell,
        position,
        speed_centi_kmh: parse_u16_be(body, 41, "speed")?,
        course_centi_deg: parse_u16_be(body, 43, "course")?,
        satellites: parse_u8(body, 45, "satellites")?,
        fix: FixStatus::from_raw(parse_u8(body, 46, "fix status")?),
        inputs: IoState::new(parse_u8(body, 47, "inputs")?),
        outputs: IoState::new(parse_u8(body, 48, "outputs")?),
        mode: DeviceMode::from_raw(parse_u8(body, 49, "mode")?),
        report_type: parse_u8(body, 50, "report type")?,
        message_number: parse_u16_be(body, 51, "message number")?,
        assign_map: parse_u32_be(body, 54, "assign map")?,
        extension: body.slice(STATUS_FIXED_LEN..),
    };

    trace!(device = %report.device, message_number = report.message_number, "Decoded status report");
    Ok(report)
}

fn decode_sensor(body: &Bytes) -> Result<SensorReport, DecodeError> {
    ensure_len(body, SENSOR_FIXED_LEN, "sensor report")?;
    let prefix = decode_prefix(body)?;

    let scan_performed = parse_u8(body, 15, "scan status")? == 1;
    let total_packets = parse_u8(body, 16, "total packets")?;
    let packet_index = parse_u8(body, 17, "packet index")?;
    if total_packets == 0 || packet_index == 0 || packet_index > total_packets {
        return Err(DecodeError::FragmentIndex { index: packet_index, total: total_packets });
    }

    let count = parse_u16_be(body, 18, "sensor count")?;
    let scan_time = parse_array::<6>(body, 20, "scan time")?;
    let scan_raw =
        Position::from_wire(parse_u32_be(body, 26, "scan latitude")?, parse_u32_be(body, 30, "scan longitude")?);
    let scan_position = (scan_performed && !scan_raw.is_null()).then_some(scan_raw);

    let n = usize::from(count);
    let lengths_start = SENSOR_FIXED_LEN;
    let lengths = parse_slice(body, lengths_start, n, "advertisement lengths")?;
    let payload_total: usize = lengths.iter().map(|len| usize::from(*len)).sum();

    let expected = SENSOR_FIXED_LEN + n * SENSOR_ENTRY_OVERHEAD + payload_total;
    if body.len() != expected {
        return Err(DecodeError::CountMismatch { count, expected, actual: body.len() });
    }

    let payload_start = lengths_start + n;
    let mac_start = payload_start + payload_total;
    let rssi_start = mac_start + 6 * n;

    let mut sensors = Vec::with_capacity(n);
    let mut payload_offset = payload_start;
    for (i, len) in lengths.iter().enumerate() {
        let len = usize::from(*len);
        let advertisement = body.slice(payload_offset..payload_offset + len);
        payload_offset += len;

        let mac = MacAddress(parse_array::<6>(body, mac_start + 6 * i, "mac address")?);
        let rssi = parse_u8(body, rssi_start + i, "rssi")? as i8;
        sensors.push(SensorRecord { mac, rssi, location: scan_position, advertisement });
    }

    let report = SensorReport {
        device: prefix.device,
        report_map: prefix.report_map,
        model: prefix.model,
        software: prefix.software,
        session: SessionId::from_scan_time(scan_time),
        timestamp: decode_device_time(scan_time),
        scan_performed,
        scan_position,
        packet_index,
        total_packets,
        sensors,
    };

    trace!(
        device = %report.device,
        session = %report.session,
        packet = report.packet_index,
        total = report.total_packets,
        sensors = report.sensors.len(),
        "Decoded sensor report"
    );
    Ok(report)
}

fn ensure_len(body: &[u8], min: usize, field: &'static str) -> Result<(), DecodeError> {
    if body.len() < min {
        return Err(DecodeError::truncated(field, 0, min, body.len()));
    }
    Ok(())
}

/// Bounds-checked byte parsing helpers
fn parse_slice<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    field: &'static str,
) -> Result<&'a [u8], DecodeError> {
    data.get(offset..offset + len).ok_or_else(|| {
        DecodeError::truncated(field, offset, len, data.len().saturating_sub(offset))
    })
}

fn parse_array<const N: usize>(
    data: &[u8],
    offset: usize,
    field: &'static str,
) -> Result<[u8; N], DecodeError> {
    let mut out = [0u8; N];
    out.copy_from_slice(parse_slice(data, offset, N, field)?);
    Ok(out)
}

fn parse_u8(data: &[u8], offset: usize, field: &'static str) -> Result<u8, DecodeError> {
    Ok(parse_array::<1>(data, offset, field)?[0])
}

fn parse_u16_be(data: &[u8], offset: usize, field: &'static str) -> Result<u16, DecodeError> {
    Ok(u16::from_be_bytes(parse_array(data, offset, field)?))
}

fn parse_u32_be(data: &[u8], offset: usize, field: &'static str) -> Result<u32, DecodeError> {
    Ok(u32::from_be_bytes(parse_array(data, offset, field)?))
}
