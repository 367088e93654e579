//! End-to-end ingestion over real TCP connections

mod common;

use common::{read_acks, send, sensor_frame, status_frame};
use suntrack::types::DecodedMessage;
use suntrack::{Config, Server, ServerHandle};
use tokio::net::TcpStream;

const DEVICE_A: [u8; 5] = [0x10, 0x00, 0x00, 0x00, 0x01];
const DEVICE_B: [u8; 5] = [0x10, 0x00, 0x00, 0x00, 0x02];

async fn start() -> ServerHandle {
    Server::bind(Config::loopback()).await.expect("bind loopback").spawn()
}

fn message_numbers(handle: &ServerHandle, device: u64) -> Vec<u16> {
    handle
        .pipeline()
        .snapshot()
        .iter()
        .filter_map(|record| match &record.message {
            DecodedMessage::StatusReport(report) if report.device.value() == device => {
                Some(report.message_number)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn status_frame_is_acknowledged_and_stored() {
    let handle = start().await;
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    let wire = status_frame(DEVICE_A, 1);
    send(&mut device, &wire).await;
    let ack = read_acks(&mut device, 1).await;
    assert_eq!(ack, wire[..8]);

    let snapshot = handle.pipeline().snapshot();
    assert_eq!(snapshot.len(), 1);
    let record = snapshot.first().unwrap();
    assert_eq!(record.peer, Some(device.local_addr().unwrap()));
    match &record.message {
        DecodedMessage::StatusReport(report) => {
            assert_eq!(report.device.value(), 1_000_000_001);
            assert_eq!(report.position.latitude(), 31.23);
            assert_eq!(report.position.longitude(), 121.47);
        }
        other => panic!("Expected status report, got {:?}", other),
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_connections_keep_their_own_order() {
    let handle = start().await;
    let addr = handle.local_addr();
    const FRAMES: u16 = 25;

    let run_device = |device: [u8; 5]| async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        for n in 1..=FRAMES {
            send(&mut stream, &status_frame(device, n)).await;
            read_acks(&mut stream, 1).await;
        }
    };
    tokio::join!(run_device(DEVICE_A), run_device(DEVICE_B));

    let expected: Vec<u16> = (1..=FRAMES).collect();
    assert_eq!(message_numbers(&handle, 1_000_000_001), expected);
    assert_eq!(message_numbers(&handle, 1_000_000_002), expected);
    assert_eq!(handle.pipeline().snapshot().len(), 2 * usize::from(FRAMES));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn corrupted_checksum_is_skipped_and_connection_survives() {
    let handle = start().await;
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    let mut corrupted = status_frame(DEVICE_A, 2);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let mut stream = status_frame(DEVICE_A, 1);
    stream.extend_from_slice(&corrupted);
    stream.extend_from_slice(&status_frame(DEVICE_A, 3));
    send(&mut device, &stream).await;

    read_acks(&mut device, 2).await;
    assert_eq!(message_numbers(&handle, 1_000_000_001), [1, 3]);

    send(&mut device, &status_frame(DEVICE_A, 4)).await;
    read_acks(&mut device, 1).await;
    assert_eq!(message_numbers(&handle, 1_000_000_001), [1, 3, 4]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn frames_split_across_writes_are_reassembled() {
    let handle = start().await;
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    let wire = status_frame(DEVICE_A, 9);
    for chunk in wire.chunks(7) {
        send(&mut device, chunk).await;
        tokio::task::yield_now().await;
    }
    read_acks(&mut device, 1).await;
    assert_eq!(message_numbers(&handle, 1_000_000_001), [9]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn scan_fragments_merge_even_across_connections() {
    let handle = start().await;
    let mut first = TcpStream::connect(handle.local_addr()).await.unwrap();
    let mut second = TcpStream::connect(handle.local_addr()).await.unwrap();

    send(&mut first, &sensor_frame(DEVICE_B, 2, 2, 10, 2)).await;
    read_acks(&mut first, 1).await;
    assert!(handle.pipeline().snapshot().is_empty());
    assert_eq!(handle.pipeline().pending_sessions(), 1);

    send(&mut second, &sensor_frame(DEVICE_B, 1, 2, 0, 3)).await;
    read_acks(&mut second, 1).await;

    let snapshot = handle.pipeline().snapshot();
    assert_eq!(snapshot.len(), 1);
    match &snapshot.first().unwrap().message {
        DecodedMessage::SensorReport(report) => {
            let tags: Vec<u8> = report.sensors.iter().map(|s| s.mac.0[5]).collect();
            assert_eq!(tags, [0, 1, 2, 10, 11]);
            assert_eq!(report.total_packets, 2);
        }
        other => panic!("Expected sensor report, got {:?}", other),
    }
    assert_eq!(handle.pipeline().beacon_sightings().len(), 5);
    assert_eq!(handle.pipeline().pending_sessions(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn undecodable_frame_is_dropped_without_closing() {
    let handle = start().await;
    let mut device = TcpStream::connect(handle.local_addr()).await.unwrap();

    // Packet index beyond the declared total passes framing but cannot decode.
    let mut stream = sensor_frame(DEVICE_A, 3, 2, 0, 1);
    stream.extend_from_slice(&status_frame(DEVICE_A, 5));
    send(&mut device, &stream).await;

    read_acks(&mut device, 1).await;
    assert_eq!(message_numbers(&handle, 1_000_000_001), [5]);
    assert_eq!(handle.pipeline().stats().decode_failures, 1);

    handle.shutdown().await.unwrap();
}
