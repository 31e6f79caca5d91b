//! `std::net` implementation of the [`Acceptor`] and [`Connection`] ports.
//!
//! ESP-IDF exposes lwIP through the standard socket API, so this adapter
//! serves both the device and host-side runs. The response session expects
//! a raw-TCP style interface (bounded send buffer, acknowledgement events),
//! which is emulated on top of a non-blocking socket:
//!
//! - `write` copies into a bounded pending buffer; the free space is the
//!   send window, and a write that does not fit is refused as
//!   [`WriteError::OutOfMemory`]
//! - `output` pushes pending bytes into the socket
//! - bytes the socket takes are reported by `poll_acked`
//! - inbound request bytes are read and discarded so the peer's request
//!   never fills our receive window
//! - a reset, abort or broken pipe from the peer is reported as
//!   [`WriteError::PeerClosed`], never as a local failure
//!
//! The listen backlog is whatever the platform default is; the node only
//! serves one connection at a time regardless.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use log::{debug, warn};

use crate::app::ports::{Acceptor, Connection, WriteError};
use crate::error::NetworkError;

const DISCARD_CHUNK: usize = 256;
/// Reads of inbound data per `output` call; a chatty peer cannot hold the loop.
const DISCARD_READS_PER_CALL: usize = 8;

fn is_peer_gone(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

pub struct TcpAcceptor {
    listener: TcpListener,
    send_buffer: usize,
}

impl TcpAcceptor {
    /// Bind and listen on `addr`. Connections get `send_buffer` bytes of window.
    pub fn bind(addr: SocketAddr, send_buffer: usize) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr).map_err(|e| {
            warn!("tcp: bind {} failed: {}", addr, e);
            NetworkError::Bind
        })?;
        listener.set_nonblocking(true).map_err(|e| {
            warn!("tcp: set_nonblocking failed: {}", e);
            NetworkError::Listen
        })?;
        debug!("tcp: listening on {}", addr);
        Ok(Self {
            listener,
            send_buffer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener.local_addr().map_err(|_| NetworkError::Generic)
    }
}

impl Acceptor for TcpAcceptor {
    type Connection = TcpConnection;

    fn accept(&mut self) -> Result<Option<TcpConnection>, NetworkError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("tcp: accepted {}", peer);
                stream.set_nonblocking(true).map_err(|_| NetworkError::Accept)?;
                let _ = stream.set_nodelay(true);
                Ok(Some(TcpConnection::new(stream, self.send_buffer)))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!("tcp: accept failed: {}", e);
                Err(NetworkError::Accept)
            }
        }
    }
}

pub struct TcpConnection {
    stream: Option<TcpStream>,
    pending: Vec<u8>,
    capacity: usize,
    drained: usize,
    peer_gone: bool,
}

impl TcpConnection {
    fn new(stream: TcpStream, capacity: usize) -> Self {
        Self {
            stream: Some(stream),
            pending: Vec::with_capacity(capacity),
            capacity,
            drained: 0,
            peer_gone: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Read and drop what the peer sent, at most `DISCARD_READS_PER_CALL`
    /// chunks. Returns `true` if the peer reset the connection.
    fn discard_inbound(stream: &mut TcpStream) -> bool {
        let mut scratch = [0u8; DISCARD_CHUNK];
        for _ in 0..DISCARD_READS_PER_CALL {
            match stream.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => debug!("tcp: discarded {} request bytes", n),
                Err(e) => return is_peer_gone(e.kind()),
            }
        }
        false
    }

    fn mark_peer_gone(&mut self) -> WriteError {
        if !self.peer_gone {
            warn!("tcp: peer went away with {} bytes unsent", self.pending.len());
        }
        self.peer_gone = true;
        self.pending.clear();
        WriteError::PeerClosed
    }
}

impl Connection for TcpConnection {
    fn send_window(&self) -> usize {
        if self.stream.is_none() {
            return 0;
        }
        self.capacity - self.pending.len()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        if self.stream.is_none() {
            return Err(WriteError::Failed);
        }
        if self.peer_gone {
            return Err(WriteError::PeerClosed);
        }
        if data.len() > self.send_window() {
            return Err(WriteError::OutOfMemory);
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    fn output(&mut self) -> Result<(), WriteError> {
        if self.peer_gone {
            return Err(WriteError::PeerClosed);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(WriteError::Failed);
        };
        if Self::discard_inbound(stream) {
            return Err(self.mark_peer_gone());
        }

        while !self.pending.is_empty() {
            match stream.write(&self.pending) {
                Ok(0) => return Err(self.mark_peer_gone()),
                Ok(n) => {
                    self.pending.drain(..n);
                    self.drained += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if is_peer_gone(e.kind()) => {
                    debug!("tcp: send: {}", e);
                    return Err(self.mark_peer_gone());
                }
                Err(e) => {
                    warn!("tcp: send failed: {}", e);
                    return Err(WriteError::Failed);
                }
            }
        }
        Ok(())
    }

    fn poll_acked(&mut self) -> Result<usize, NetworkError> {
        if self.stream.is_none() {
            return Ok(0);
        }
        // Keep draining between acknowledgement polls. A vanished peer
        // shows up through `peer_closed`.
        match self.output() {
            Ok(()) | Err(WriteError::OutOfMemory | WriteError::PeerClosed) => {}
            Err(WriteError::Failed) => return Err(NetworkError::WritePart),
        }
        Ok(core::mem::take(&mut self.drained))
    }

    fn peer_closed(&self) -> bool {
        self.peer_gone
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Unread request bytes would turn the close into a reset.
            let _ = Self::discard_inbound(&mut stream);
            // Best effort: the peer may already be gone.
            let _ = stream.set_nonblocking(false);
            let _ = stream.shutdown(Shutdown::Write);
            debug!("tcp: closed");
        }
        self.pending.clear();
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
