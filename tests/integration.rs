//! End-to-end exercises of the public socket facades over the real
//! loopback UDP substrate (no fault injection — see DESIGN.md for why the
//! lossy-network scenarios are covered at the engine level instead: the
//! client and server bind the crate's fixed `CLIENT_IP:CLIENT_PORT` /
//! `SERVER_IP:SERVER_PORT` endpoints, so there is no seam to splice a
//! relay into from outside the crate, and only one connection can be
//! in flight at a time).

use std::sync::Mutex;
use std::thread;

use btcp::{BtcpClientSocket, BtcpServerSocket};

/// The client and server both bind fixed, crate-wide constant endpoints, so
/// at most one test may have a connection in flight at a time regardless of
/// the test runner's default thread-per-test parallelism.
static FIXED_ENDPOINTS: Mutex<()> = Mutex::new(());

/// Runs server `accept`/`recv` on a background thread while the client
/// connects, sends `payload`, and disconnects on the calling thread.
/// Returns the server's reassembled bytes.
fn round_trip(payload: Vec<u8>, window: u8, timeout_ms: u64) -> Vec<u8> {
    let _guard = FIXED_ENDPOINTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let server_thread = thread::spawn(move || {
        let mut server = BtcpServerSocket::new(window);
        server.accept();
        let received = server.recv();
        server.close();
        received
    });

    // Give the server a moment to bind before the client's first SYN.
    thread::sleep(std::time::Duration::from_millis(20));

    let mut client = BtcpClientSocket::new(timeout_ms);
    assert!(client.connect(), "handshake should succeed on a clean loopback link");
    assert!(client.send(&payload), "transfer should succeed on a clean loopback link");
    assert!(client.disconnect(), "termination should succeed on a clean loopback link");
    client.close();

    server_thread.join().expect("server thread should not panic")
}

#[test]
fn single_segment_transfer_round_trips_exactly() {
    let payload = b"a short message that fits in one segment".to_vec();
    let received = round_trip(payload.clone(), 5, 100);
    assert_eq!(received, payload);
}

#[test]
fn multi_segment_transfer_reassembles_in_order() {
    // Large enough to split across several PAYLOAD_SIZE (1008-byte) chunks.
    let payload: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();
    let received = round_trip(payload.clone(), 10, 100);
    assert_eq!(received, payload);
}

#[test]
fn empty_transfer_round_trips_to_empty_output() {
    let received = round_trip(Vec::new(), 5, 100);
    assert!(received.is_empty());
}
