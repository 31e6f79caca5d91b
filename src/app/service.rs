//! Node service: the cooperative main loop step and the boot-time
//! association policy.
//!
//! [`NodeService`] owns the listening socket and the [`Listener`]. The
//! binary calls [`NodeService::poll_once`] forever, sleeping briefly between
//! calls; any `Err` is terminal and goes to the fatal reporter.
//!
//! ```text
//!  Acceptor ──accept──▶ ┌──────────────┐ ──take_measurement──▶ SensorPort
//!                       │ NodeService  │
//!  Connection ◀──ack────│  Listener    │
//!                       └──────────────┘
//! ```

use log::{info, warn};

use super::ports::{Acceptor, ConnectivityError, ConnectivityPort, SensorPort};
use crate::error::{Fault, NetworkError};
use crate::http::Listener;

pub struct NodeService<A: Acceptor, S> {
    acceptor: A,
    listener: Listener<S, A::Connection>,
}

impl<A: Acceptor, S: SensorPort> NodeService<A, S> {
    pub fn new(acceptor: A, sensor: S) -> Self {
        Self {
            acceptor,
            listener: Listener::new(sensor),
        }
    }

    /// One loop step.
    ///
    /// While a response is in progress only its connection is serviced;
    /// otherwise at most one pending connection is accepted and answered.
    pub fn poll_once(&mut self) -> Result<(), Fault> {
        if self.listener.is_busy() {
            return self.listener.poll();
        }
        match self.acceptor.accept()? {
            Some(conn) => self.listener.on_accept(conn),
            None => Ok(()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.listener.is_busy()
    }

    /// Responses fully delivered since boot.
    pub fn served(&self) -> u32 {
        self.listener.served()
    }

    /// Responses abandoned because the client went away.
    pub fn dropped(&self) -> u32 {
        self.listener.dropped()
    }

    pub fn acceptor(&self) -> &A {
        &self.acceptor
    }
}

/// Associate with the access point, retrying failed attempts forever.
///
/// `between_attempts` runs after each failure and is expected to block for
/// the retry delay (the binary flashes the WLAN code and sleeps). Missing
/// or malformed credentials cannot succeed on retry and are fatal.
pub fn connect_with_retry<W, F>(wifi: &mut W, mut between_attempts: F) -> Result<u32, Fault>
where
    W: ConnectivityPort,
    F: FnMut(u32),
{
    let mut failures: u32 = 0;
    loop {
        match wifi.connect() {
            Ok(()) => {
                info!("network: associated after {} failed attempt(s)", failures);
                return Ok(failures);
            }
            Err(ConnectivityError::ConnectionFailed) => {
                failures = failures.wrapping_add(1);
                warn!("network: association failed ({}), retrying", failures);
                between_attempts(failures);
            }
            Err(e) => {
                warn!("network: {}", e);
                return Err(NetworkError::Wlan.into());
            }
        }
    }
}
