//! Two-wire bus transport shared by every sensor driver.
//!
//! Wraps any `embedded_hal::i2c::I2c` implementation and collapses its
//! error space into [`TransportError`]. A NACK on the address phase means
//! nothing is on the bus at that address; every other failure is reported
//! as a short transfer for the phase that failed.
//!
//! Register conventions:
//! - register write: `[register, value]` in one write transaction
//! - register read: write the one-byte selector, then read `N` bytes

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

use crate::error::TransportError;

/// Bus primitives addressed by 7-bit device address.
pub struct BusTransport<I> {
    i2c: I,
}

impl<I: I2c> BusTransport<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Write `bytes` to `address` in a single transaction.
    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TransportError> {
        self.i2c.write(address, bytes).map_err(|e| {
            if is_address_nack(e.kind()) {
                TransportError::DeviceNotFound
            } else {
                TransportError::ShortWrite
            }
        })
    }

    /// Write one data byte to `register`.
    pub fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError> {
        self.write(address, &[register, value])
    }

    /// Select `register`, then fill `buf` from the device.
    pub fn read_register(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        self.i2c
            .write(address, &[register])
            .map_err(|_| TransportError::SelectFailed)?;
        self.read(address, buf)
    }

    /// Read a single register byte.
    pub fn read_u8(&mut self, address: u8, register: u8) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.read_register(address, register, &mut byte)?;
        Ok(byte[0])
    }

    /// Fill `buf` from the device without selecting a register first.
    ///
    /// Command-based sensors return their result this way after the command
    /// has been written and the conversion delay has elapsed.
    pub fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        self.i2c
            .read(address, buf)
            .map_err(|_| TransportError::ShortRead)
    }

    /// Release the underlying bus.
    pub fn release(self) -> I {
        self.i2c
    }
}

fn is_address_nack(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    )
}
