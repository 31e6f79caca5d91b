//! Per-connection request handling.
//!
//! Each accepted connection gets one fresh acquisition: the sensor is read
//! synchronously, the result rendered, and a [`ResponseSession`] started on
//! the connection. The request itself is never parsed; any inbound bytes are
//! left to the connection adapter to discard.
//!
//! Only one exchange is active at a time. Acquisition blocks the loop, so a
//! second client would wait in the accept backlog anyway.

use log::{debug, info, warn};

use super::exposition;
use super::session::{AckOutcome, ResponseSession};
use crate::app::ports::{Connection, SensorPort};
use crate::error::Fault;

/// A connection paired with the response being sent on it.
struct Exchange<C> {
    conn: C,
    session: ResponseSession,
}

pub struct Listener<S, C> {
    sensor: S,
    active: Option<Exchange<C>>,
    served: u32,
    dropped: u32,
}

impl<S: SensorPort, C: Connection> Listener<S, C> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            active: None,
            served: 0,
            dropped: 0,
        }
    }

    /// A response is still being transmitted.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Responses fully delivered so far.
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Responses abandoned because the peer went away.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Measure, render and begin sending on a freshly accepted connection.
    pub fn on_accept(&mut self, mut conn: C) -> Result<(), Fault> {
        if self.active.is_some() {
            warn!("listener: busy, dropping extra connection");
            conn.close();
            return Ok(());
        }

        let set = self.sensor.take_measurement()?;
        if set.is_empty() {
            warn!("listener: sensor returned no readings");
        }
        let document = exposition::render(&set);
        debug!("listener: {} metric(s), {} bytes", set.len(), document.len());

        let session = ResponseSession::start(document.into_bytes(), &mut conn)?;
        self.active = Some(Exchange { conn, session });
        Ok(())
    }

    /// Feed acknowledgements from the active connection into its session.
    ///
    /// A session with nothing in flight is nudged with a zero-length
    /// acknowledgement so it can retry a write that found the buffer full.
    /// The same nudge ends a session whose peer has gone away.
    pub fn poll(&mut self) -> Result<(), Fault> {
        let Some(Exchange { mut conn, session }) = self.active.take() else {
            return Ok(());
        };

        let acked = conn.poll_acked()?;
        let peer_gone = session.is_peer_closed() || conn.peer_closed();
        if acked == 0 && !session.is_stalled() && !peer_gone {
            self.active = Some(Exchange { conn, session });
            return Ok(());
        }

        match session.on_ack(acked, &mut conn)? {
            AckOutcome::Sending(session) => {
                self.active = Some(Exchange { conn, session });
            }
            AckOutcome::Complete => {
                self.served = self.served.wrapping_add(1);
                info!("listener: response #{} complete", self.served);
            }
            AckOutcome::Aborted => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("listener: response dropped, peer went away");
            }
        }
        Ok(())
    }
}
