//! Frame construction and server helpers shared by the integration tests

#![allow(dead_code)]

use std::time::Duration;
use suntrack::protocol::xor_checksum;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const ACK_LEN: usize = 8;

pub fn hex_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len()).step_by(2).map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap()).collect()
}

fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    let declared = (frame.len() + 1 - 8) as u16;
    frame[1..3].copy_from_slice(&declared.to_be_bytes());
    let checksum = xor_checksum(&frame);
    frame.push(checksum);
    frame
}

fn prefix(header: u8, device: [u8; 5]) -> Vec<u8> {
    let mut frame = vec![header, 0, 0];
    frame.extend_from_slice(&device);
    frame.extend_from_slice(&[0x00, 0x7F, 0xFF, 0xC7, 0x01, 0x01, 0x0C]);
    frame
}

/// A status report with a valid trailer, positioned in Shanghai.
pub fn status_frame(device: [u8; 5], message_number: u16) -> Vec<u8> {
    let mut frame = prefix(0x81, device);
    frame.push(0x01);
    frame.extend_from_slice(&[25, 11, 19, 12, 0, 0]);
    frame.extend_from_slice(&[0; 11]); // cell, mcc, mnc, lac, rx level
    frame.extend_from_slice(&31_230_000u32.to_be_bytes());
    frame.extend_from_slice(&121_470_000u32.to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0, 0, 8, 1, 0, 0, 1, 1]);
    frame.extend_from_slice(&message_number.to_be_bytes());
    frame.extend_from_slice(&[0; 5]); // reserved, assign map
    seal(frame)
}

/// One packet of a BLE scan carrying tracked tags numbered from `first_tag`.
pub fn sensor_frame(device: [u8; 5], index: u8, total: u8, first_tag: u8, tags: u8) -> Vec<u8> {
    let advertisement = [0x02, 0x01, 0x06];
    let mut frame = prefix(0xAA, device);
    frame.extend_from_slice(&[0x01, total, index]);
    frame.extend_from_slice(&u16::from(tags).to_be_bytes());
    frame.extend_from_slice(&[25, 11, 19, 12, 0, 0]);
    frame.extend_from_slice(&31_230_000u32.to_be_bytes());
    frame.extend_from_slice(&121_470_000u32.to_be_bytes());
    frame.extend(std::iter::repeat_n(advertisement.len() as u8, usize::from(tags)));
    for _ in 0..tags {
        frame.extend_from_slice(&advertisement);
    }
    for tag in first_tag..first_tag + tags {
        frame.extend_from_slice(&[0xAC, 0x23, 0x3F, 0x00, 0x00, tag]);
    }
    frame.extend(std::iter::repeat_n(0xC4, usize::from(tags)));
    seal(frame)
}

/// Read `count` acknowledgments, failing after a generous timeout.
pub async fn read_acks(stream: &mut TcpStream, count: usize) -> Vec<u8> {
    let mut acks = vec![0u8; count * ACK_LEN];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut acks))
        .await
        .expect("acknowledgments within timeout")
        .expect("read acknowledgments");
    acks
}

pub async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.expect("write to server");
}
