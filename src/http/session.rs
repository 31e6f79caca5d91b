//! Resumable transmission of one response buffer over one connection.
//!
//! The stack's send buffer is usually smaller than the response, so the
//! buffer is queued in pieces. Each acknowledgement frees window space and
//! drives the next piece:
//!
//! ```text
//!   start ──▶ Sending ──on_ack──▶ Sending ──on_ack──▶ Complete
//!                ▲                    │
//!                └────────────────────┘
//! ```
//!
//! Byte accounting, with `offset` the number of bytes handed to the stack:
//!
//! - in flight (`bytes_queued`) = `offset - acknowledged`
//! - remaining to queue = `total - offset`
//!
//! so `bytes_queued + remaining == total - acknowledged` at all times.
//!
//! [`ResponseSession::on_ack`] consumes the session. Reaching `Complete`
//! drops the buffer and closes the connection; there is no value left to
//! call `on_ack` on afterwards. A peer that resets the connection ends the
//! session as `Aborted` the same way, without a fault.

use log::{debug, info, warn};

use crate::app::ports::{Connection, WriteError};
use crate::error::{Fault, NetworkError};

/// Result of feeding an acknowledgement to a session.
#[derive(Debug)]
pub enum AckOutcome {
    /// More bytes are outstanding.
    Sending(ResponseSession),
    /// Every byte was acknowledged; the connection has been closed.
    Complete,
    /// The peer went away mid-response; the connection has been closed.
    Aborted,
}

#[derive(Debug)]
pub struct ResponseSession {
    buffer: Vec<u8>,
    offset: usize,
    acknowledged: usize,
    chunks: u32,
    peer_closed: bool,
}

impl ResponseSession {
    /// Queue as much of `buffer` as the current send window admits.
    ///
    /// Running out of buffer space on the very first write is fatal: no
    /// acknowledgement would ever arrive to resume the transfer. A peer that
    /// is already gone is only recorded; the next `on_ack` ends the session.
    pub fn start<C: Connection>(buffer: Vec<u8>, conn: &mut C) -> Result<Self, Fault> {
        let mut session = Self {
            buffer,
            offset: 0,
            acknowledged: 0,
            chunks: 0,
            peer_closed: false,
        };

        let chunk = session.total().min(conn.send_window());
        if chunk > 0 {
            match conn.write(&session.buffer[..chunk]) {
                Ok(()) => session.advance(chunk),
                Err(WriteError::OutOfMemory) => {
                    return Err(NetworkError::WriteBeginOutOfMemory.into());
                }
                Err(WriteError::PeerClosed) => session.peer_closed = true,
                Err(WriteError::Failed) => return Err(NetworkError::WriteBegin.into()),
            }
        }
        if !session.peer_closed {
            session.peer_closed = flush(conn, NetworkError::WriteBegin)?;
        }

        debug!(
            "session: {} of {} bytes queued on start",
            session.offset,
            session.total()
        );
        Ok(session)
    }

    /// Account for `acked` newly acknowledged bytes and queue the next piece.
    ///
    /// Transient buffer exhaustion leaves the session where it was; the next
    /// acknowledgement (or a zero-length retry) tries again.
    pub fn on_ack<C: Connection>(mut self, acked: usize, conn: &mut C) -> Result<AckOutcome, Fault> {
        if self.peer_closed || conn.peer_closed() {
            return Ok(self.abort(conn));
        }

        let in_flight = self.bytes_queued();
        let acked = if acked > in_flight {
            warn!(
                "session: {} bytes acknowledged with only {} in flight",
                acked, in_flight
            );
            in_flight
        } else {
            acked
        };
        self.acknowledged += acked;

        if self.acknowledged == self.total() {
            info!(
                "session: {} bytes delivered in {} chunk(s)",
                self.total(),
                self.chunks
            );
            drop(self.buffer);
            conn.close();
            return Ok(AckOutcome::Complete);
        }

        let chunk = conn.send_window().min(self.bytes_remaining_to_queue());
        if chunk > 0 {
            match conn.write(&self.buffer[self.offset..self.offset + chunk]) {
                Ok(()) => self.advance(chunk),
                Err(WriteError::OutOfMemory) => {
                    debug!("session: send buffer full, waiting for next ack");
                }
                Err(WriteError::PeerClosed) => return Ok(self.abort(conn)),
                Err(WriteError::Failed) => return Err(NetworkError::WritePart.into()),
            }
        }
        if flush(conn, NetworkError::WritePart)? {
            return Ok(self.abort(conn));
        }

        Ok(AckOutcome::Sending(self))
    }

    fn abort<C: Connection>(self, conn: &mut C) -> AckOutcome {
        warn!(
            "session: peer closed after {} of {} bytes acknowledged",
            self.acknowledged,
            self.total()
        );
        drop(self.buffer);
        conn.close();
        AckOutcome::Aborted
    }

    fn advance(&mut self, chunk: usize) {
        self.offset += chunk;
        self.chunks += 1;
    }

    /// Length of the whole response.
    pub fn total(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes handed to the stack and not yet acknowledged.
    pub fn bytes_queued(&self) -> usize {
        self.offset - self.acknowledged
    }

    /// Bytes not yet handed to the stack.
    pub fn bytes_remaining_to_queue(&self) -> usize {
        self.total() - self.offset
    }

    pub fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Number of successful writes so far.
    pub fn chunks_written(&self) -> u32 {
        self.chunks
    }

    /// Nothing is in flight, so no acknowledgement will arrive by itself.
    pub fn is_stalled(&self) -> bool {
        self.bytes_queued() == 0
    }

    /// The peer was seen going away; the next `on_ack` ends the session.
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }
}

/// Push queued bytes out. `Ok(true)` means the peer has gone away.
fn flush<C: Connection>(conn: &mut C, on_failure: NetworkError) -> Result<bool, Fault> {
    match conn.output() {
        Ok(()) | Err(WriteError::OutOfMemory) => Ok(false),
        Err(WriteError::PeerClosed) => Ok(true),
        Err(WriteError::Failed) => Err(on_failure.into()),
    }
}
