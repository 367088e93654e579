//! Replays traffic captured from a production tracker, which sends no checksum trailer

mod common;

use common::{hex_bytes, read_acks, send};
use suntrack::types::DecodedMessage;
use suntrack::{Config, Server};
use tokio::net::TcpStream;

/// Packet 2 of 2 of the scan at 2025-11-19 21:52:15.
const PACKET_2_OF_2: &str = "aa00851990000910007fffc701010c0102020003190b1315340f02edf43c874f5a2a1a1a1f0201060303e1ff1216e1ffa108649519293f23ac566563696d610201060303e1ff1216e1ffa10864052b5e3f23ac566563696d610201061bff3906ca1a018e3c2b5ec8052b5eca951929eda9aa75c22c5219dcac233f291995ac233f5e2b05c3000040089dcbbfca";

/// Packet 1 of 2 of the same scan.
const PACKET_1_OF_2: &str = "aa00e51990000910007fffc701010c0102010006190b1315340f02edf43c874f5a2a1a1a1a1a191a0201060303e1ff1216e1ffa10864a9aa753f23ac566563696d610201060303e1ff1216e1ffa108643c2b5e3f23ac566563696d610201060303e1ff1216e1ffa10864efa7753f23ac566563696d610201060303e1ff1216e1ffa10864acc5f23f23ac566563696d610201060303e1ff1116e1ffa10864739d410000c34d544230370201060303e1ff1216e1ffa1086421d8060000c3566563696d61ac233f75aaa9ac233f5e2b3cac233f75a7efac233ff2c5acc30000419d73c3000006d821b6c1bcbbbbb8";

/// Packet 2 of 2 of the scan at 23:57:15, whose first packet never arrived.
const ORPHAN_PACKET: &str = "aa00851990000910007fffc701010c0102020003190b1317390f02edf43c874f5a2a1a1a1f0201060303e1ff1216e1ffa108643c2b5e3f23ac566563696d610201060303e1ff1216e1ffa10864efa7753f23ac566563696d610201061bff3906ca1a01e2951929ec052b5eca3c2b5ecaefa775c84f4f8167ac233f5e2b3cac233f75a7efc3000040089dbbb5c4";

#[tokio::test]
async fn captured_scan_reassembles_into_one_record() {
    let handle = Server::bind(Config::loopback().without_checksum()).await.unwrap().spawn();
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    let mut stream = hex_bytes(PACKET_2_OF_2);
    stream.extend(hex_bytes(PACKET_1_OF_2));
    stream.extend(hex_bytes(ORPHAN_PACKET));
    send(&mut device, &stream).await;
    read_acks(&mut device, 3).await;

    let pipeline = handle.pipeline();
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.len(), 1);

    let DecodedMessage::SensorReport(report) = &snapshot.first().unwrap().message else {
        panic!("captured scan should produce a sensor report");
    };
    assert_eq!(report.device.value(), 1_990_000_910);
    assert_eq!(report.sensors.len(), 9);
    assert_eq!(report.tracked_tags().count(), 9);
    assert_eq!(report.sensors[0].mac.to_string(), "AC:23:3F:75:AA:A9");
    assert_eq!(report.sensors[8].rssi, -54);

    let position = report.scan_position.expect("scan position");
    assert_eq!(position.latitude(), 49.148988);
    assert_eq!(position.longitude(), -122.640938);

    assert_eq!(pipeline.beacon_sightings().len(), 9);
    assert_eq!(pipeline.pending_sessions(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn snapshot_serializes_for_display() {
    let handle = Server::bind(Config::loopback().without_checksum()).await.unwrap().spawn();
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    let mut stream = hex_bytes(PACKET_1_OF_2);
    stream.extend(hex_bytes(PACKET_2_OF_2));
    send(&mut device, &stream).await;
    read_acks(&mut device, 2).await;

    let json = serde_json::to_value(handle.pipeline().snapshot()).unwrap();
    let record = &json[0];
    assert_eq!(record["message"]["type"], "SensorReport");
    assert_eq!(record["message"]["device"], 1_990_000_910u64);
    assert_eq!(record["message"]["software"], "1.1.12");
    assert_eq!(record["message"]["sensors"][0]["mac"], "AC:23:3F:75:AA:A9");
    assert_eq!(record["message"]["timestamp"], "2025-11-19T21:52:15");

    handle.shutdown().await.unwrap();
}
