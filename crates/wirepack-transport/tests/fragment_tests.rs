//! Datagram Fragmentation Tests
//!
//! Splitting on send and reassembly on receive, driven through a scripted
//! datagram primitive.

mod common;

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};

use common::MockDatagram;
use wirepack_transport::fragment::{send_fragmented, PendingPacket};
use wirepack_transport::{status_of, Error, Status};

const MAX: usize = 1400;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn sent_sizes(len: usize) -> Vec<usize> {
    let mut socket = MockDatagram::new();
    send_fragmented(&mut socket, &payload(len), addr(9000), MAX).unwrap();
    socket.sizes()
}

// ============================================================================
// Sending
// ============================================================================

#[test]
fn test_exact_multiple_gets_empty_terminal() {
    assert_eq!(sent_sizes(2800), vec![1400, 1400, 0]);
    assert_eq!(sent_sizes(1400), vec![1400, 0]);
}

#[test]
fn test_remainder_is_terminal() {
    assert_eq!(sent_sizes(2799), vec![1400, 1399]);
    assert_eq!(sent_sizes(1401), vec![1400, 1]);
}

#[test]
fn test_small_and_empty_packets_are_one_datagram() {
    assert_eq!(sent_sizes(1), vec![1]);
    assert_eq!(sent_sizes(0), vec![0]);
}

#[test]
fn test_every_fragment_goes_to_target() {
    let mut socket = MockDatagram::new();
    let count = send_fragmented(&mut socket, &payload(5000), addr(9001), MAX).unwrap();

    assert_eq!(count, 4);
    assert!(socket.sent.iter().all(|(_, to)| *to == addr(9001)));
    let joined: Vec<u8> = socket.sent.iter().flat_map(|(b, _)| b.clone()).collect();
    assert_eq!(joined, payload(5000));
}

#[test]
fn test_send_stops_at_first_failure() {
    let mut socket = MockDatagram {
        fail_from: Some(1),
        ..MockDatagram::new()
    };

    let result = send_fragmented(&mut socket, &payload(4000), addr(9002), MAX);

    assert_eq!(status_of(&result), Status::Error);
    assert_eq!(socket.sizes(), vec![1400]);
}

#[test]
fn test_send_rejects_zero_max_size() {
    let mut socket = MockDatagram::new();

    let result = send_fragmented(&mut socket, &payload(3), addr(9003), 0);

    assert!(matches!(result, Err(Error::ZeroDatagramSize)));
    assert!(socket.sent.is_empty());
}

// ============================================================================
// Reassembly
// ============================================================================

fn reassemble(len: usize) -> (Vec<u8>, SocketAddr) {
    let mut sender = MockDatagram::new();
    send_fragmented(&mut sender, &payload(len), addr(9100), MAX).unwrap();

    let mut receiver = MockDatagram::new();
    let last = sender.sent.len() - 1;
    for (i, (bytes, _)) in sender.sent.iter().enumerate() {
        let port = if i == last { 7777 } else { 6666 };
        receiver = receiver.arrive(bytes, addr(port));
    }

    let mut pending = PendingPacket::new();
    pending.receive(&mut receiver, MAX).unwrap()
}

#[test]
fn test_reassembly_reproduces_payload() {
    for len in [0, 1, 1399, 1400, 1401, 2800, 2801] {
        let (bytes, _) = reassemble(len);
        assert_eq!(bytes, payload(len), "payload of {len} bytes");
    }
}

#[test]
fn test_reassembly_reports_terminal_sender() {
    let (_, sender) = reassemble(3000);
    assert_eq!(sender, addr(7777));
}

#[test]
fn test_error_mid_sequence_discards_partial_packet() {
    let mut socket = MockDatagram::new()
        .arrive(&[1; MAX], addr(1))
        .fail_recv(ErrorKind::ConnectionRefused)
        .arrive(&[2; 10], addr(1));
    let mut pending = PendingPacket::new();

    let result = pending.receive(&mut socket, MAX);
    assert!(matches!(result, Err(Error::Io(_))));
    assert!(pending.is_empty());
    assert_eq!(pending.datagram_count(), 0);

    // The next packet starts from scratch
    let (bytes, _) = pending.receive(&mut socket, MAX).unwrap();
    assert_eq!(bytes, vec![2; 10]);
}

#[test]
fn test_not_ready_mid_sequence_discards_partial_packet() {
    let mut socket = MockDatagram::new().arrive(&[3; MAX], addr(1));
    let mut pending = PendingPacket::new();

    let result = pending.receive(&mut socket, MAX);
    assert_eq!(status_of(&result), Status::NotReady);
    assert!(pending.is_empty());
}

#[test]
fn test_receive_rejects_zero_max_size_without_draining() {
    let mut socket = MockDatagram::new()
        .arrive(&[1; 4], addr(1))
        .arrive(&[2; 4], addr(1))
        .arrive(&[3; 2], addr(1));
    let mut pending = PendingPacket::new();

    let result = pending.receive(&mut socket, 0);

    assert!(matches!(result, Err(Error::ZeroDatagramSize)));
    assert_eq!(socket.inbound.len(), 3);

    let (bytes, _) = pending.receive(&mut socket, 4).unwrap();
    assert_eq!(bytes, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3]);
}
