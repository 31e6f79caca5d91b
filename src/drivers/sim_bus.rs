//! Simulated bus devices for host builds.
//!
//! On ESP-IDF the sensor drivers talk to the real I2C peripheral. On the
//! host they talk to one of these, which implement `embedded_hal::i2c::I2c`
//! so the drivers run unmodified in tests and simulation.
//!
//! - [`SimRegisterBus`]: register-mapped device with auto-incrementing reads
//!   (BME68x style).
//! - [`SimCommandBus`]: command-response device that returns canned bytes for
//!   the last written command (SHT style).
//! - [`SimDelay`]: records requested delays instead of sleeping.

use std::collections::{HashMap, VecDeque};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

/// Error returned by the simulated buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimBusError(pub ErrorKind);

impl i2c::Error for SimBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// A one-shot injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFailure {
    /// The next write operation is NACKed on its data phase.
    Write,
    /// The next read operation fails.
    Read,
}

const ADDRESS_NACK: SimBusError =
    SimBusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
const DATA_NACK: SimBusError = SimBusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));

// ───────────────────────────────────────────────────────────────
// Register-mapped device
// ───────────────────────────────────────────────────────────────

/// Register-mapped device with a 256-byte register file.
pub struct SimRegisterBus {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    failures: VecDeque<SimFailure>,
    /// `(register, mask, reads)`: `mask` reads as clear in `register` for the
    /// first `reads - 1` reads that start there.
    latch: Option<(u8, u8, u32)>,
    reads_of: HashMap<u8, u32>,
}

impl SimRegisterBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
            failures: VecDeque::new(),
            latch: None,
            reads_of: HashMap::new(),
        }
    }

    /// Preload consecutive registers starting at `start`.
    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.registers[start as usize + i] = *b;
        }
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    /// Report `mask` as clear in `register` until the `reads`-th read.
    pub fn latch_after(&mut self, register: u8, mask: u8, reads: u32) {
        self.latch = Some((register, mask, reads));
    }

    pub fn fail_next(&mut self, failure: SimFailure) {
        self.failures.push_back(failure);
    }

    /// How many read transactions started at `register`.
    pub fn reads_of(&self, register: u8) -> u32 {
        self.reads_of.get(&register).copied().unwrap_or(0)
    }

    fn take_failure(&mut self, kind: SimFailure) -> bool {
        if self.failures.front() == Some(&kind) {
            self.failures.pop_front();
            true
        } else {
            false
        }
    }

    fn read_into(&mut self, buf: &mut [u8]) {
        let start = self.pointer;
        let count = self.reads_of.entry(start).or_insert(0);
        *count += 1;
        let seen = *count;
        for b in buf.iter_mut() {
            let mut value = self.registers[self.pointer as usize];
            if let Some((reg, mask, reads)) = self.latch {
                if reg == self.pointer && reg == start && seen < reads {
                    value &= !mask;
                }
            }
            *b = value;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl ErrorType for SimRegisterBus {
    type Error = SimBusError;
}

impl I2c for SimRegisterBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(ADDRESS_NACK);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if self.take_failure(SimFailure::Write) {
                        return Err(DATA_NACK);
                    }
                    if let Some((reg, data)) = bytes.split_first() {
                        self.pointer = *reg;
                        for b in data {
                            self.registers[self.pointer as usize] = *b;
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    if self.take_failure(SimFailure::Read) {
                        return Err(SimBusError(ErrorKind::Other));
                    }
                    self.read_into(buf);
                }
            }
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Command-response device
// ───────────────────────────────────────────────────────────────

/// Command-response device: a read returns the bytes registered for the
/// most recently written command.
pub struct SimCommandBus {
    address: u8,
    responses: HashMap<Vec<u8>, Vec<u8>>,
    last_command: Option<Vec<u8>>,
    failures: VecDeque<SimFailure>,
    commands: Vec<Vec<u8>>,
}

impl SimCommandBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            responses: HashMap::new(),
            last_command: None,
            failures: VecDeque::new(),
            commands: Vec::new(),
        }
    }

    /// Register the bytes returned after `command` is written.
    pub fn respond(&mut self, command: &[u8], response: &[u8]) {
        self.responses.insert(command.to_vec(), response.to_vec());
    }

    pub fn fail_next(&mut self, failure: SimFailure) {
        self.failures.push_back(failure);
    }

    /// Every command written so far.
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    fn take_failure(&mut self, kind: SimFailure) -> bool {
        if self.failures.front() == Some(&kind) {
            self.failures.pop_front();
            true
        } else {
            false
        }
    }
}

impl ErrorType for SimCommandBus {
    type Error = SimBusError;
}

impl I2c for SimCommandBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(ADDRESS_NACK);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if self.take_failure(SimFailure::Write) {
                        return Err(DATA_NACK);
                    }
                    self.commands.push(bytes.to_vec());
                    self.last_command = Some(bytes.to_vec());
                }
                Operation::Read(buf) => {
                    if self.take_failure(SimFailure::Read) {
                        return Err(SimBusError(ErrorKind::Other));
                    }
                    let response = self
                        .last_command
                        .as_ref()
                        .and_then(|c| self.responses.get(c))
                        .ok_or(SimBusError(ErrorKind::Other))?;
                    if response.len() < buf.len() {
                        return Err(SimBusError(ErrorKind::Other));
                    }
                    buf.copy_from_slice(&response[..buf.len()]);
                }
            }
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Delay
// ───────────────────────────────────────────────────────────────

/// Delay provider that records each request instead of sleeping.
#[derive(Debug, Default)]
pub struct SimDelay {
    requests_ns: Vec<u64>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delay calls made.
    pub fn calls(&self) -> usize {
        self.requests_ns.len()
    }

    /// Total time requested, in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.requests_ns.iter().sum::<u64>() / 1_000_000
    }

    /// Shortest single delay requested, in milliseconds.
    pub fn min_ms(&self) -> Option<u64> {
        self.requests_ns.iter().min().map(|ns| ns / 1_000_000)
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.requests_ns.push(u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.requests_ns.push(u64::from(ms) * 1_000_000);
    }
}
