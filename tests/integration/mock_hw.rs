//! Mock network and sensor adapters for integration tests.
//!
//! `MockConnection` behaves like a raw TCP control block: a fixed send
//! buffer, writes that fail when they do not fit, and acknowledgements
//! released by the test. Shared state lives behind `Rc<RefCell<..>>` so a
//! test can keep inspecting a connection after handing it to the service.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sensornode::app::ports::{Acceptor, Connection, SensorPort, WriteError};
use sensornode::error::{Fault, NetworkError};
use sensornode::sensors::{Measurement, MeasurementSet};

// ── Connection ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct WireState {
    /// Bytes accepted by `write`, in order.
    pub sent: Vec<u8>,
    /// Size of every successful write.
    pub writes: Vec<usize>,
    /// Bytes written but not yet acknowledged.
    pub unacked: usize,
    /// Acknowledgements the test has released but the session not yet seen.
    pub releasable: usize,
    pub closed: u32,
    pub outputs: u32,
    /// Scripted results for upcoming writes.
    pub write_script: VecDeque<WriteError>,
    pub ack_error: Option<NetworkError>,
}

#[derive(Clone)]
pub struct MockConnection {
    pub state: Rc<RefCell<WireState>>,
    capacity: usize,
    /// Acknowledge everything automatically on each poll.
    auto_ack: bool,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(WireState::default())),
            capacity,
            auto_ack: true,
        }
    }

    /// Acknowledgements are only delivered through [`Self::ack`].
    pub fn manual(capacity: usize) -> Self {
        Self {
            auto_ack: false,
            ..Self::new(capacity)
        }
    }

    /// Release `n` acknowledged bytes for the next poll.
    pub fn ack(&self, n: usize) {
        let mut s = self.state.borrow_mut();
        let n = n.min(s.unacked - s.releasable);
        s.releasable += n;
    }

    pub fn fail_next_write(&self, e: WriteError) {
        self.state.borrow_mut().write_script.push_back(e);
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8(self.state.borrow().sent.clone()).unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed > 0
    }
}

impl Connection for MockConnection {
    fn send_window(&self) -> usize {
        self.capacity - self.state.borrow().unacked
    }

    fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let window = self.send_window();
        let mut s = self.state.borrow_mut();
        if let Some(e) = s.write_script.pop_front() {
            return Err(e);
        }
        if data.len() > window {
            return Err(WriteError::OutOfMemory);
        }
        s.sent.extend_from_slice(data);
        s.writes.push(data.len());
        s.unacked += data.len();
        Ok(())
    }

    fn output(&mut self) -> Result<(), WriteError> {
        self.state.borrow_mut().outputs += 1;
        Ok(())
    }

    fn poll_acked(&mut self) -> Result<usize, NetworkError> {
        let mut s = self.state.borrow_mut();
        if let Some(e) = s.ack_error.take() {
            return Err(e);
        }
        let n = if self.auto_ack {
            s.unacked
        } else {
            core::mem::take(&mut s.releasable)
        };
        s.unacked -= n;
        Ok(n)
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}

// ── Acceptor ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAcceptor {
    pub pending: VecDeque<Result<MockConnection, NetworkError>>,
    pub accept_calls: u32,
}

#[allow(dead_code)]
impl MockAcceptor {
    pub fn with(conns: impl IntoIterator<Item = MockConnection>) -> Self {
        Self {
            pending: conns.into_iter().map(Ok).collect(),
            accept_calls: 0,
        }
    }
}

impl Acceptor for MockAcceptor {
    type Connection = MockConnection;

    fn accept(&mut self) -> Result<Option<MockConnection>, NetworkError> {
        self.accept_calls += 1;
        self.pending.pop_front().transpose()
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// Sensor returning a fixed set, optionally failing on a given call.
pub struct MockSensor {
    pub readings: Vec<(&'static str, f64)>,
    pub calls: Rc<RefCell<u32>>,
    pub fail_on_call: Option<(u32, Fault)>,
}

#[allow(dead_code)]
impl MockSensor {
    pub fn new(readings: &[(&'static str, f64)]) -> Self {
        Self {
            readings: readings.to_vec(),
            calls: Rc::new(RefCell::new(0)),
            fail_on_call: None,
        }
    }
}

impl SensorPort for MockSensor {
    fn initialize(&mut self) -> Result<(), Fault> {
        Ok(())
    }

    fn take_measurement(&mut self) -> Result<MeasurementSet, Fault> {
        let mut calls = self.calls.borrow_mut();
        *calls += 1;
        if let Some((n, fault)) = self.fail_on_call {
            if *calls == n {
                return Err(fault);
            }
        }
        Ok(self
            .readings
            .iter()
            .map(|&(name, v)| Measurement::gauge(name, v))
            .collect())
    }
}
