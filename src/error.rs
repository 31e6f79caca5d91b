//! Unified fault taxonomy for the sensor node firmware.
//!
//! Every fault in this firmware is unrecoverable: it propagates up through
//! `Result` to the top-level loop, which hands [`Fault::code`] to the
//! [`FatalReporter`](crate::app::ports::FatalReporter) and never returns.
//! All variants are `Copy` so they can be passed around without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level fault
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The two-wire bus misbehaved.
    Transport(TransportError),
    /// Data or the checksum routine failed an integrity check.
    Integrity(IntegrityError),
    /// The sensor did not follow its readiness protocol.
    Protocol(ProtocolError),
    /// The network stack refused an operation.
    Network(NetworkError),
}

impl Fault {
    /// Numeric identity shown by the fatal indicator.
    ///
    /// 1..=15 keep the legacy firmware numbering; sensor-side faults start
    /// at 17. Gaps are retired codes and must not be reused.
    pub const fn code(self) -> u8 {
        match self {
            Self::Network(e) => match e {
                NetworkError::Generic => 1,
                NetworkError::Init => 2,
                NetworkError::Wlan => 3,
                NetworkError::Mdns => 4,
                NetworkError::Bind => 6,
                NetworkError::Listen => 7,
                NetworkError::Finish => 8,
                NetworkError::Accept => 9,
                NetworkError::WritePart => 10,
                NetworkError::WriteBegin => 12,
                NetworkError::WriteBeginOutOfMemory => 13,
                NetworkError::ServiceTxt => 15,
            },
            Self::Integrity(IntegrityError::ChecksumSelfTest) => 14,
            Self::Transport(e) => match e {
                TransportError::DeviceNotFound => 17,
                TransportError::ShortWrite => 18,
                TransportError::SelectFailed => 19,
                TransportError::ShortRead => 20,
                TransportError::BusInit => 24,
            },
            Self::Integrity(IntegrityError::ChecksumMismatch) => 21,
            Self::Integrity(IntegrityError::ChipIdMismatch) => 22,
            Self::Protocol(ProtocolError::NotReady) => 23,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Integrity(e) => write!(f, "integrity: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No device acknowledged its address.
    DeviceNotFound,
    /// The device accepted fewer bytes than requested.
    ShortWrite,
    /// Writing the register selector before a read failed.
    SelectFailed,
    /// The device returned fewer bytes than requested.
    ShortRead,
    /// The bus controller itself could not be brought up.
    BusInit,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => write!(f, "device not found"),
            Self::ShortWrite => write!(f, "short write"),
            Self::SelectFailed => write!(f, "register select failed"),
            Self::ShortRead => write!(f, "short read"),
            Self::BusInit => write!(f, "bus controller setup failed"),
        }
    }
}

impl From<TransportError> for Fault {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Integrity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    /// The checksum routine failed its known-answer test at startup.
    ChecksumSelfTest,
    /// A word read from the device carried the wrong checksum.
    ChecksumMismatch,
    /// The identity register did not hold the expected chip id.
    ChipIdMismatch,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumSelfTest => write!(f, "checksum self-test failed"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::ChipIdMismatch => write!(f, "unexpected chip id"),
        }
    }
}

impl From<IntegrityError> for Fault {
    fn from(e: IntegrityError) -> Self {
        Self::Integrity(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The ready bit was not observed within the configured poll bound.
    NotReady,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "sensor never signalled ready"),
        }
    }
}

impl From<ProtocolError> for Fault {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    Generic,
    /// Radio / network interface bring-up failed.
    Init,
    /// Association with the access point failed.
    Wlan,
    /// The mDNS responder could not be registered.
    Mdns,
    Bind,
    Listen,
    /// The service loop exited.
    Finish,
    /// The stack signalled an error on an inbound connection.
    Accept,
    /// A continuation write failed for a reason other than buffer exhaustion.
    WritePart,
    /// The first write of a response failed.
    WriteBegin,
    /// The first write of a response found no buffer space.
    WriteBeginOutOfMemory,
    /// The mDNS TXT record could not be attached.
    ServiceTxt,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic failure"),
            Self::Init => write!(f, "network init failed"),
            Self::Wlan => write!(f, "WLAN association failed"),
            Self::Mdns => write!(f, "mDNS registration failed"),
            Self::Bind => write!(f, "bind failed"),
            Self::Listen => write!(f, "listen failed"),
            Self::Finish => write!(f, "service loop finished"),
            Self::Accept => write!(f, "accept failed"),
            Self::WritePart => write!(f, "continuation write failed"),
            Self::WriteBegin => write!(f, "initial write failed"),
            Self::WriteBeginOutOfMemory => write!(f, "initial write out of memory"),
            Self::ServiceTxt => write!(f, "mDNS TXT record failed"),
        }
    }
}

impl From<NetworkError> for Fault {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Fault>;
