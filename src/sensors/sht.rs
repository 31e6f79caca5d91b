//! Sensirion SHT3x / SHT4x humidity and temperature sensors.
//!
//! Both families are command based: write a measurement command, wait a
//! fixed datasheet-derived conversion time, then read six bytes holding two
//! CRC-protected words (temperature, humidity). They differ only in command
//! width, conversion time, humidity scaling and how presence is checked.
//!
//! | Model | Command | Delay   | Humidity                 | Presence check   |
//! |-------|---------|---------|--------------------------|------------------|
//! | SHT3x | 0x2C06  | 1000 ms | 100·raw/65535            | one measurement  |
//! | SHT4x | 0xFD    | 25 ms   | 125·raw/65535 − 6        | serial (0x89)    |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::crc;
use super::{Measurement, MeasurementSet};
use crate::app::ports::SensorPort;
use crate::drivers::transport::BusTransport;
use crate::error::Fault;

/// Fixed 7-bit bus address for both families.
pub const ADDRESS: u8 = 0x44;

/// SHT3x single shot, high repeatability, clock stretching enabled.
const SHT3X_MEASURE_HIGH: [u8; 2] = [0x2C, 0x06];
/// SHT4x single shot, high precision.
const SHT4X_MEASURE_HIGH: [u8; 1] = [0xFD];
/// SHT4x serial number readout.
const SHT4X_READ_SERIAL: [u8; 1] = [0x89];

/// SHT4x datasheet maximum is 8.3 ms; 25 ms leaves ample margin.
const SHT4X_DELAY_MS: u32 = 25;
const SHT3X_DELAY_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShtModel {
    Sht3x,
    Sht4x,
}

impl ShtModel {
    fn measure_command(self) -> &'static [u8] {
        match self {
            Self::Sht3x => &SHT3X_MEASURE_HIGH,
            Self::Sht4x => &SHT4X_MEASURE_HIGH,
        }
    }

    fn conversion_delay_ms(self) -> u32 {
        match self {
            Self::Sht3x => SHT3X_DELAY_MS,
            Self::Sht4x => SHT4X_DELAY_MS,
        }
    }

    /// Relative humidity in percent from the raw humidity word.
    pub fn humidity_percent(self, raw: u16) -> f64 {
        let ratio = f64::from(raw) / 65535.0;
        match self {
            Self::Sht3x => 100.0 * ratio,
            Self::Sht4x => (125.0 * ratio) - 6.0,
        }
    }
}

/// Temperature in °C from the raw temperature word (same for both families).
pub fn temperature_celsius(raw: u16) -> f64 {
    (175.0 * (f64::from(raw) / 65535.0)) - 45.0
}

/// Driver for one SHT3x or SHT4x on the bus.
pub struct ShtSensor<I, D> {
    model: ShtModel,
    bus: BusTransport<I>,
    delay: D,
}

impl<I: I2c, D: DelayNs> ShtSensor<I, D> {
    pub fn new(model: ShtModel, i2c: I, delay: D) -> Self {
        Self {
            model,
            bus: BusTransport::new(i2c),
            delay,
        }
    }

    /// Issue `command`, wait out the conversion and return both words.
    fn command(&mut self, command: &[u8]) -> Result<[u16; 2], Fault> {
        self.bus.write(ADDRESS, command)?;
        self.delay.delay_ms(self.model.conversion_delay_ms());

        let mut data = [0u8; 6];
        self.bus.read(ADDRESS, &mut data)?;

        let [a0, a1, a2, b0, b1, b2] = data;
        let first = crc::checked_word(&[a0, a1, a2])?;
        let second = crc::checked_word(&[b0, b1, b2])?;
        Ok([first, second])
    }

    /// Release the underlying bus.
    pub fn release(self) -> I {
        self.bus.release()
    }
}

impl<I: I2c, D: DelayNs> SensorPort for ShtSensor<I, D> {
    fn initialize(&mut self) -> Result<(), Fault> {
        crc::self_test()?;

        match self.model {
            ShtModel::Sht3x => {
                self.command(self.model.measure_command())?;
                info!("SHT3x: present at 0x{:02X}", ADDRESS);
            }
            ShtModel::Sht4x => {
                let [hi, lo] = self.command(&SHT4X_READ_SERIAL)?;
                let serial = (u32::from(hi) << 16) | u32::from(lo);
                info!("SHT4x: present at 0x{:02X}, serial {:08X}", ADDRESS, serial);
            }
        }
        Ok(())
    }

    fn take_measurement(&mut self) -> Result<MeasurementSet, Fault> {
        let [raw_temp, raw_humid] = self.command(self.model.measure_command())?;
        debug!("{:?}: raw T=0x{:04X} RH=0x{:04X}", self.model, raw_temp, raw_humid);

        let mut set = MeasurementSet::new();
        set.push(Measurement::gauge("temp", temperature_celsius(raw_temp)));
        set.push(Measurement::gauge("humid", self.model.humidity_percent(raw_humid)));
        Ok(set)
    }
}
