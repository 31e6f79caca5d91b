//! End-to-end request handling against mock sockets.

use sensornode::app::NodeService;
use sensornode::app::ports::{SensorPort, WriteError};
use sensornode::error::{Fault, IntegrityError, NetworkError};
use sensornode::http::exposition::RESPONSE_HEAD;

use crate::mock_hw::{MockAcceptor, MockConnection, MockSensor};

fn sht_like() -> MockSensor {
    MockSensor::new(&[("temp", 23.5), ("humid", 45.12)])
}

const EXPECTED: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8\r\n\
\r\n\
# TYPE temp gauge\n\
temp 23.500000\n\
# TYPE humid gauge\n\
humid 45.120000\n\
# EOF\n";

fn run_until_idle<S: SensorPort>(svc: &mut NodeService<MockAcceptor, S>) {
    for _ in 0..1000 {
        svc.poll_once().unwrap();
        if !svc.is_busy() {
            return;
        }
    }
    panic!("response never completed");
}

#[test]
fn one_connection_gets_one_document() {
    let conn = MockConnection::new(2920);
    let mut svc = NodeService::new(MockAcceptor::with([conn.clone()]), sht_like());

    svc.poll_once().unwrap();
    assert!(svc.is_busy());
    run_until_idle(&mut svc);

    assert_eq!(conn.sent_text(), EXPECTED);
    assert!(conn.is_closed());
    assert_eq!(svc.served(), 1);
}

#[test]
fn tiny_send_buffer_still_delivers_everything() {
    let conn = MockConnection::new(7);
    let mut svc = NodeService::new(MockAcceptor::with([conn.clone()]), sht_like());

    svc.poll_once().unwrap();
    run_until_idle(&mut svc);

    assert_eq!(conn.sent_text(), EXPECTED);
    let writes = conn.state.borrow().writes.clone();
    assert!(writes.iter().all(|&w| w <= 7));
    assert_eq!(writes.iter().sum::<usize>(), EXPECTED.len());
    assert_eq!(conn.state.borrow().closed, 1);
}

#[test]
fn partial_acknowledgements_drive_the_session() {
    let conn = MockConnection::manual(64);
    let mut svc = NodeService::new(MockAcceptor::with([conn.clone()]), sht_like());
    svc.poll_once().unwrap();
    assert_eq!(conn.state.borrow().sent.len(), 64);

    // Nothing acknowledged: no progress, no retry while bytes are in flight.
    svc.poll_once().unwrap();
    assert_eq!(conn.state.borrow().writes.len(), 1);

    conn.ack(10);
    svc.poll_once().unwrap();
    assert_eq!(conn.state.borrow().sent.len(), 74);

    while svc.is_busy() {
        let unacked = conn.state.borrow().unacked;
        conn.ack(unacked);
        svc.poll_once().unwrap();
    }
    assert_eq!(conn.sent_text(), EXPECTED);
    assert!(conn.is_closed());
}

#[test]
fn transient_exhaustion_mid_transfer_is_retried() {
    let conn = MockConnection::new(16);
    let mut svc = NodeService::new(MockAcceptor::with([conn.clone()]), sht_like());
    svc.poll_once().unwrap();

    conn.fail_next_write(WriteError::OutOfMemory);
    svc.poll_once().unwrap();
    assert!(svc.is_busy());

    run_until_idle(&mut svc);
    assert_eq!(conn.sent_text(), EXPECTED);
}

#[test]
fn exhaustion_on_first_write_is_fatal() {
    let conn = MockConnection::new(2920);
    conn.fail_next_write(WriteError::OutOfMemory);
    let mut svc = NodeService::new(MockAcceptor::with([conn]), sht_like());
    assert_eq!(
        svc.poll_once(),
        Err(Fault::Network(NetworkError::WriteBeginOutOfMemory))
    );
}

#[test]
fn continuation_write_failure_is_fatal() {
    let conn = MockConnection::new(16);
    let mut svc = NodeService::new(MockAcceptor::with([conn.clone()]), sht_like());
    svc.poll_once().unwrap();
    conn.fail_next_write(WriteError::Failed);
    assert_eq!(
        svc.poll_once(),
        Err(Fault::Network(NetworkError::WritePart))
    );
}

#[test]
fn accept_error_is_fatal() {
    let mut acceptor = MockAcceptor::default();
    acceptor.pending.push_back(Err(NetworkError::Accept));
    let mut svc = NodeService::new(acceptor, sht_like());
    assert_eq!(svc.poll_once(), Err(Fault::Network(NetworkError::Accept)));
}

#[test]
fn sensor_fault_during_request_is_fatal() {
    let mut sensor = sht_like();
    sensor.fail_on_call = Some((2, IntegrityError::ChecksumMismatch.into()));
    let first = MockConnection::new(2920);
    let second = MockConnection::new(2920);
    let mut svc = NodeService::new(
        MockAcceptor::with([first.clone(), second.clone()]),
        sensor,
    );

    svc.poll_once().unwrap();
    run_until_idle(&mut svc);
    assert_eq!(first.sent_text(), EXPECTED);

    assert_eq!(
        svc.poll_once(),
        Err(Fault::Integrity(IntegrityError::ChecksumMismatch))
    );
    assert!(second.state.borrow().sent.is_empty());
}

#[test]
fn connections_are_served_one_at_a_time() {
    let a = MockConnection::manual(32);
    let b = MockConnection::new(2920);
    let sensor = sht_like();
    let calls = sensor.calls.clone();
    let mut svc = NodeService::new(MockAcceptor::with([a.clone(), b.clone()]), sensor);

    svc.poll_once().unwrap();
    for _ in 0..5 {
        svc.poll_once().unwrap();
    }
    // `a` is stuck waiting for acknowledgements; `b` must not be accepted.
    assert_eq!(svc.acceptor().accept_calls, 1);
    assert_eq!(*calls.borrow(), 1);

    while svc.is_busy() {
        let unacked = a.state.borrow().unacked;
        a.ack(unacked);
        svc.poll_once().unwrap();
    }
    svc.poll_once().unwrap();
    run_until_idle(&mut svc);
    assert_eq!(b.sent_text(), EXPECTED);
    assert_eq!(svc.served(), 2);
    assert_eq!(*calls.borrow(), 2);
}

#[test]
fn identical_readings_give_identical_documents() {
    let a = MockConnection::new(2920);
    let b = MockConnection::new(2920);
    let mut svc = NodeService::new(MockAcceptor::with([a.clone(), b.clone()]), sht_like());
    for _ in 0..2 {
        svc.poll_once().unwrap();
        run_until_idle(&mut svc);
    }
    assert_eq!(a.sent_text(), b.sent_text());
    assert!(a.sent_text().starts_with(RESPONSE_HEAD));
}
