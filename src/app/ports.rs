//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Listener / NodeService (domain)
//! ```
//!
//! Driven adapters (sensor drivers, the socket layer, the status indicator)
//! implement these traits. The domain consumes them via generics, so the
//! response pipeline never touches hardware or sockets directly.

use crate::error::{Fault, NetworkError};
use crate::sensors::MeasurementSet;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Capability set shared by every sensor family.
pub trait SensorPort {
    /// One-time bring-up: self-tests, presence checks, calibration.
    fn initialize(&mut self) -> Result<(), Fault>;

    /// Run one full acquisition and return the compensated readings.
    ///
    /// Blocks for the family's conversion delay or readiness polling.
    fn take_measurement(&mut self) -> Result<MeasurementSet, Fault>;
}

impl<T: SensorPort + ?Sized> SensorPort for Box<T> {
    fn initialize(&mut self) -> Result<(), Fault> {
        (**self).initialize()
    }

    fn take_measurement(&mut self) -> Result<MeasurementSet, Fault> {
        (**self).take_measurement()
    }
}

// ───────────────────────────────────────────────────────────────
// Network ports (driven adapter: domain ↔ TCP stack)
// ───────────────────────────────────────────────────────────────

/// Why a write into the connection's send buffer was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// No buffer space right now; retry after the next acknowledgement.
    OutOfMemory,
    /// The peer reset or aborted the connection. Not a local failure: the
    /// exchange is dropped and the node keeps serving.
    PeerClosed,
    /// The connection is unusable.
    Failed,
}

/// One accepted TCP connection.
pub trait Connection {
    /// Bytes the stack can accept right now without blocking.
    fn send_window(&self) -> usize;

    /// Queue `data` for transmission. Never queues a partial slice.
    fn write(&mut self, data: &[u8]) -> Result<(), WriteError>;

    /// Push queued data towards the peer.
    fn output(&mut self) -> Result<(), WriteError>;

    /// Bytes acknowledged since the previous call.
    fn poll_acked(&mut self) -> Result<usize, NetworkError>;

    /// The peer has gone away; nothing more will be acknowledged.
    fn peer_closed(&self) -> bool {
        false
    }

    /// Close the connection. Further calls are no-ops.
    fn close(&mut self);
}

/// The listening socket.
pub trait Acceptor {
    type Connection: Connection;

    /// Accept one pending connection without blocking.
    ///
    /// `Ok(None)` means nothing is waiting.
    fn accept(&mut self) -> Result<Option<Self::Connection>, NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Fatal reporter (driven adapter: domain → human)
// ───────────────────────────────────────────────────────────────

/// Terminal fault signalling. Never returns.
pub trait FatalReporter {
    fn report(&mut self, fault: Fault) -> !;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ radio)
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConnectivityPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

/// Station-mode network association.
pub trait ConnectivityPort {
    /// Block until associated and holding an address, or fail.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;
}
