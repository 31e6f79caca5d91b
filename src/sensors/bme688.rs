//! Bosch BME688 temperature / pressure / humidity sensor.
//!
//! Register-mapped device at 0x76. One acquisition is a forced-mode cycle:
//!
//! 1. write `ctrl_meas` = forced mode, ×16 temperature and pressure
//!    oversampling (humidity oversampling is set once at init)
//! 2. sleep 1 s, read `meas_status_0`, repeat until `new_data` (bit 7)
//! 3. burst-read the raw ADC block 0x1D..=0x26
//! 4. apply the datasheet floating-point compensation
//!
//! Calibration coefficients are read once during [`SensorPort::initialize`]
//! and kept for the life of the driver. The gas heater is not used.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::{Measurement, MeasurementSet};
use crate::app::ports::SensorPort;
use crate::drivers::transport::BusTransport;
use crate::error::{Fault, IntegrityError, ProtocolError};

/// Fixed 7-bit bus address (SDO tied low).
pub const ADDRESS: u8 = 0x76;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const CHIP_ID: u8 = 0x61;

/// `spi_3w_int_en<6>`, `osrs_h<2:0>`
pub const REG_CTRL_HUM: u8 = 0x72;
/// `osrs_t<7:5>`, `osrs_p<4:2>`, `mode<1:0>`
pub const REG_CTRL_MEAS: u8 = 0x74;
/// `new_data<7>`
pub const REG_MEAS_STATUS: u8 = 0x1D;
const NEW_DATA: u8 = 1 << 7;

/// First calibration block, `par_t2` through `par_p10`.
pub const REG_COEFF1: u8 = 0x8A;
pub const COEFF1_LEN: usize = 23;
/// Second calibration block, `par_h2` through `par_t1`.
pub const REG_COEFF2: u8 = 0xE1;
pub const COEFF2_LEN: usize = 10;

/// Raw data block: status, sub-index, press[3], temp[3], hum[2].
const DATA_LEN: usize = 10;

const OVERSAMPLE_16X: u8 = 0x5;
const MODE_FORCED: u8 = 0x1;

/// `ctrl_meas` value requesting one forced ×16/×16 conversion.
pub const CTRL_MEAS_FORCED: u8 = MODE_FORCED | (OVERSAMPLE_16X << 2) | (OVERSAMPLE_16X << 5);

const POLL_INTERVAL_MS: u32 = 1000;

// ───────────────────────────────────────────────────────────────
// Calibration
// ───────────────────────────────────────────────────────────────

/// Factory calibration coefficients, with datasheet signedness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,

    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,

    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
}

impl Calibration {
    /// Decode the two calibration blocks as read from
    /// [`REG_COEFF1`] and [`REG_COEFF2`].
    pub fn from_registers(c1: &[u8; COEFF1_LEN], c2: &[u8; COEFF2_LEN]) -> Self {
        // Offsets are register address minus block start.
        let u16_at = |b: &[u8], i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let i16_at = |b: &[u8], i: usize| i16::from_le_bytes([b[i], b[i + 1]]);

        Self {
            par_t2: i16_at(c1, 0x00),
            par_t3: c1[0x02] as i8,
            par_p1: u16_at(c1, 0x04),
            par_p2: i16_at(c1, 0x06),
            par_p3: c1[0x08] as i8,
            par_p4: i16_at(c1, 0x0A),
            par_p5: i16_at(c1, 0x0C),
            par_p7: c1[0x0E] as i8,
            par_p6: c1[0x0F] as i8,
            par_p8: i16_at(c1, 0x12),
            par_p9: i16_at(c1, 0x14),
            par_p10: c1[0x16],

            // 0xE2 is shared: low nibble belongs to h1, high nibble to h2.
            par_h2: (u16::from(c2[0x00]) << 4) | (u16::from(c2[0x01]) >> 4),
            par_h1: (u16::from(c2[0x02]) << 4) | (u16::from(c2[0x01]) & 0x0F),
            par_h3: c2[0x03] as i8,
            par_h4: c2[0x04] as i8,
            par_h5: c2[0x05] as i8,
            par_h6: c2[0x06],
            par_h7: c2[0x07] as i8,
            par_t1: u16_at(c2, 0x08),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Raw sample
// ───────────────────────────────────────────────────────────────

/// Raw ADC codes from one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// 20-bit
    pub temperature: u32,
    /// 20-bit
    pub pressure: u32,
    /// 16-bit
    pub humidity: u16,
}

impl RawSample {
    /// Decode the block read from [`REG_MEAS_STATUS`].
    fn from_block(b: &[u8; DATA_LEN]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };
        Self {
            pressure: adc20(b[2], b[3], b[4]),
            temperature: adc20(b[5], b[6], b[7]),
            humidity: u16::from_be_bytes([b[8], b[9]]),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Compensation
// ───────────────────────────────────────────────────────────────

/// Compensated temperature in °C together with `t_fine`, which the
/// pressure formula consumes.
pub fn compensate_temperature(cal: &Calibration, temp_adc: u32) -> (f64, f64) {
    let adc = f64::from(temp_adc);
    let t1 = f64::from(cal.par_t1);

    let var1 = ((adc / 16384.0) - (t1 / 1024.0)) * f64::from(cal.par_t2);
    let var2 = ((adc / 131072.0) - (t1 / 8192.0))
        * ((adc / 131072.0) - (t1 / 8192.0))
        * (f64::from(cal.par_t3) * 16.0);
    let t_fine = var1 + var2;
    (t_fine / 5120.0, t_fine)
}

/// Compensated pressure in Pa.
///
/// Returns exactly 0.0 when the scaling term is zero instead of dividing.
pub fn compensate_pressure(cal: &Calibration, press_adc: u32, t_fine: f64) -> f64 {
    let mut var1 = (t_fine / 2.0) - 64000.0;
    let mut var2 = var1 * var1 * (f64::from(cal.par_p6) / 131072.0);
    var2 += var1 * f64::from(cal.par_p5) * 2.0;
    var2 = (var2 / 4.0) + (f64::from(cal.par_p4) * 65536.0);
    var1 = (((f64::from(cal.par_p3) * var1 * var1) / 16384.0) + (f64::from(cal.par_p2) * var1))
        / 524288.0;
    var1 = (1.0 + (var1 / 32768.0)) * f64::from(cal.par_p1);

    if var1 == 0.0 {
        return 0.0;
    }

    let mut press = 1048576.0 - f64::from(press_adc);
    press = ((press - (var2 / 4096.0)) * 6250.0) / var1;
    let var1 = (f64::from(cal.par_p9) * press * press) / 2147483648.0;
    let var2 = press * (f64::from(cal.par_p8) / 32768.0);
    let var3 = (press / 256.0)
        * (press / 256.0)
        * (press / 256.0)
        * (f64::from(cal.par_p10) / 131072.0);
    press + (var1 + var2 + var3 + (f64::from(cal.par_p7) * 128.0)) / 16.0
}

/// Compensated relative humidity in percent.
pub fn compensate_humidity(cal: &Calibration, hum_adc: u16, temp_comp: f64) -> f64 {
    let var1 = f64::from(hum_adc)
        - ((f64::from(cal.par_h1) * 16.0) + ((f64::from(cal.par_h3) / 2.0) * temp_comp));
    let var2 = var1
        * ((f64::from(cal.par_h2) / 262144.0)
            * (1.0
                + ((f64::from(cal.par_h4) / 16384.0) * temp_comp)
                + ((f64::from(cal.par_h5) / 1048576.0) * temp_comp * temp_comp)));
    let var3 = f64::from(cal.par_h6) / 16384.0;
    let var4 = f64::from(cal.par_h7) / 2097152.0;
    var2 + ((var3 + (var4 * temp_comp)) * var2 * var2)
}

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

pub struct Bme688<I, D> {
    bus: BusTransport<I>,
    delay: D,
    calibration: Option<Calibration>,
    poll_limit: Option<u32>,
}

impl<I: I2c, D: DelayNs> Bme688<I, D> {
    /// `poll_limit` bounds the readiness polls; `None` waits indefinitely.
    pub fn new(i2c: I, delay: D, poll_limit: Option<u32>) -> Self {
        Self {
            bus: BusTransport::new(i2c),
            delay,
            calibration: None,
            poll_limit,
        }
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    fn read_calibration(&mut self) -> Result<Calibration, Fault> {
        let mut c1 = [0u8; COEFF1_LEN];
        let mut c2 = [0u8; COEFF2_LEN];
        self.bus.read_register(ADDRESS, REG_COEFF1, &mut c1)?;
        self.bus.read_register(ADDRESS, REG_COEFF2, &mut c2)?;
        Ok(Calibration::from_registers(&c1, &c2))
    }

    /// Sleep-then-check until the conversion has latched.
    fn wait_ready(&mut self) -> Result<(), Fault> {
        let mut polls: u32 = 0;
        loop {
            self.delay.delay_ms(POLL_INTERVAL_MS);
            polls += 1;
            let status = self.bus.read_u8(ADDRESS, REG_MEAS_STATUS)?;
            if status & NEW_DATA != 0 {
                debug!("BME688: ready after {} poll(s)", polls);
                return Ok(());
            }
            if self.poll_limit.is_some_and(|limit| polls >= limit) {
                warn!("BME688: no new_data after {} polls", polls);
                return Err(ProtocolError::NotReady.into());
            }
        }
    }

    fn read_raw(&mut self) -> Result<RawSample, Fault> {
        let mut block = [0u8; DATA_LEN];
        self.bus.read_register(ADDRESS, REG_MEAS_STATUS, &mut block)?;
        Ok(RawSample::from_block(&block))
    }

    /// Release the underlying bus.
    pub fn release(self) -> I {
        self.bus.release()
    }
}

impl<I: I2c, D: DelayNs> SensorPort for Bme688<I, D> {
    fn initialize(&mut self) -> Result<(), Fault> {
        let id = self.bus.read_u8(ADDRESS, REG_CHIP_ID)?;
        if id != CHIP_ID {
            warn!("BME688: chip id 0x{:02X}, expected 0x{:02X}", id, CHIP_ID);
            return Err(IntegrityError::ChipIdMismatch.into());
        }

        self.bus.write_register(ADDRESS, REG_CTRL_HUM, OVERSAMPLE_16X)?;
        let cal = self.read_calibration()?;
        debug!("BME688: {:?}", cal);
        self.calibration = Some(cal);

        info!("BME688: present at 0x{:02X}, calibration loaded", ADDRESS);
        Ok(())
    }

    fn take_measurement(&mut self) -> Result<MeasurementSet, Fault> {
        let cal = match self.calibration {
            Some(cal) => cal,
            None => {
                self.initialize()?;
                self.calibration.unwrap_or_default()
            }
        };

        self.bus.write_register(ADDRESS, REG_CTRL_MEAS, CTRL_MEAS_FORCED)?;
        self.wait_ready()?;
        let raw = self.read_raw()?;
        debug!("BME688: {:?}", raw);

        let (temp, t_fine) = compensate_temperature(&cal, raw.temperature);
        let pressure = compensate_pressure(&cal, raw.pressure, t_fine);
        let humid = compensate_humidity(&cal, raw.humidity, temp);

        let mut set = MeasurementSet::new();
        set.push(Measurement::gauge("temp", temp));
        set.push(Measurement::gauge("pressure", pressure));
        set.push(Measurement::gauge("humid", humid));
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim_bus::{SimDelay, SimFailure, SimRegisterBus};
    use crate::error::TransportError;

    const COEFF1: [u8; COEFF1_LEN] = [
        0xBF, 0x66, 0x03, 0x00, 0xF5, 0x90, 0x17, 0xD7, 0x58, 0x00, 0x7D, 0x1A, 0x7B, 0xFF, 0x2A,
        0x1E, 0x00, 0x00, 0xB0, 0xF3, 0x81, 0xF6, 0x1E,
    ];
    const COEFF2: [u8; COEFF2_LEN] = [0x41, 0x0B, 0x2F, 0x00, 0x2D, 0x14, 0x78, 0x9C, 0x21, 0x65];

    fn reference_calibration() -> Calibration {
        Calibration {
            par_t1: 25889,
            par_t2: 26303,
            par_t3: 3,
            par_p1: 37109,
            par_p2: -10473,
            par_p3: 88,
            par_p4: 6781,
            par_p5: -133,
            par_p6: 30,
            par_p7: 42,
            par_p8: -3152,
            par_p9: -2431,
            par_p10: 30,
            par_h1: 763,
            par_h2: 1040,
            par_h3: 0,
            par_h4: 45,
            par_h5: 20,
            par_h6: 120,
            par_h7: -100,
        }
    }

    /// temp_adc = 500000, press_adc = 350000, hum_adc = 20000
    const RAW_BLOCK: [u8; DATA_LEN] = [0x80, 0x00, 0x55, 0x73, 0x00, 0x7A, 0x12, 0x00, 0x4E, 0x20];

    fn loaded_bus() -> SimRegisterBus {
        let mut bus = SimRegisterBus::new(ADDRESS);
        bus.load(REG_CHIP_ID, &[CHIP_ID]);
        bus.load(REG_COEFF1, &COEFF1);
        bus.load(REG_COEFF2, &COEFF2);
        bus.load(REG_MEAS_STATUS, &RAW_BLOCK);
        bus
    }

    #[test]
    fn calibration_decodes_with_signedness() {
        assert_eq!(
            Calibration::from_registers(&COEFF1, &COEFF2),
            reference_calibration()
        );
    }

    #[test]
    fn raw_block_decodes_20_bit_codes() {
        let raw = RawSample::from_block(&RAW_BLOCK);
        assert_eq!(raw.temperature, 500_000);
        assert_eq!(raw.pressure, 350_000);
        assert_eq!(raw.humidity, 20_000);
    }

    #[test]
    fn temperature_polynomial() {
        let (temp, t_fine) = compensate_temperature(&reference_calibration(), 500_000);
        assert!((t_fine - 137726.008828).abs() < 1e-3);
        assert!((temp - 26.899611).abs() < 1e-3);
    }

    #[test]
    fn pressure_polynomial() {
        let cal = reference_calibration();
        let (_, t_fine) = compensate_temperature(&cal, 500_000);
        let p = compensate_pressure(&cal, 350_000, t_fine);
        assert!((p - 99569.224817).abs() < 1e-3, "got {p}");
    }

    #[test]
    fn humidity_polynomial() {
        let cal = reference_calibration();
        let (temp, _) = compensate_temperature(&cal, 500_000);
        let h = compensate_humidity(&cal, 20_000, temp);
        assert!((h - 40.453917).abs() < 1e-3, "got {h}");
    }

    #[test]
    fn pressure_zero_divisor_yields_zero() {
        let cal = Calibration {
            par_p1: 0,
            ..reference_calibration()
        };
        let (_, t_fine) = compensate_temperature(&cal, 500_000);
        assert_eq!(compensate_pressure(&cal, 350_000, t_fine), 0.0);
    }

    #[test]
    fn ctrl_meas_requests_forced_16x() {
        assert_eq!(CTRL_MEAS_FORCED, 0xB5);
    }

    #[test]
    fn full_acquisition() {
        let mut delay = SimDelay::new();
        let mut sensor = Bme688::new(loaded_bus(), &mut delay, None);
        sensor.initialize().unwrap();
        let set = sensor.take_measurement().unwrap();

        let names: Vec<_> = set.iter().map(|m| m.name).collect();
        assert_eq!(names, ["temp", "pressure", "humid"]);
        assert_eq!(set.get("temp"), Some("26.899611"));
        assert_eq!(set.get("pressure"), Some("99569.224817"));
        assert_eq!(set.get("humid"), Some("40.453917"));

        let bus = sensor.release();
        assert_eq!(bus.register(REG_CTRL_HUM), OVERSAMPLE_16X);
        assert_eq!(bus.register(REG_CTRL_MEAS), CTRL_MEAS_FORCED);
        assert_eq!(delay.calls(), 1);
        assert_eq!(delay.total_ms(), 1000);
    }

    #[test]
    fn calibration_is_read_once() {
        let mut sensor = Bme688::new(loaded_bus(), SimDelay::new(), None);
        sensor.initialize().unwrap();
        sensor.take_measurement().unwrap();
        sensor.take_measurement().unwrap();
        let bus = sensor.release();
        assert_eq!(bus.reads_of(REG_COEFF1), 1);
        assert_eq!(bus.reads_of(REG_COEFF2), 1);
    }

    #[test]
    fn polls_with_delay_until_ready() {
        let mut bus = loaded_bus();
        bus.latch_after(REG_MEAS_STATUS, NEW_DATA, 4);
        let mut delay = SimDelay::new();
        let mut sensor = Bme688::new(bus, &mut delay, None);
        sensor.initialize().unwrap();
        let set = sensor.take_measurement().unwrap();
        assert_eq!(set.get("temp"), Some("26.899611"));
        drop(sensor);
        // Every status read is preceded by a full poll interval.
        assert_eq!(delay.calls(), 4);
        assert_eq!(delay.min_ms(), Some(u64::from(POLL_INTERVAL_MS)));
    }

    #[test]
    fn poll_limit_reports_not_ready() {
        let mut bus = loaded_bus();
        bus.latch_after(REG_MEAS_STATUS, NEW_DATA, u32::MAX);
        let mut sensor = Bme688::new(bus, SimDelay::new(), Some(3));
        sensor.initialize().unwrap();
        assert_eq!(
            sensor.take_measurement(),
            Err(Fault::Protocol(ProtocolError::NotReady))
        );
    }

    #[test]
    fn wrong_chip_id_fails_init() {
        let mut bus = loaded_bus();
        bus.load(REG_CHIP_ID, &[0x60]);
        let mut sensor = Bme688::new(bus, SimDelay::new(), None);
        assert_eq!(
            sensor.initialize(),
            Err(Fault::Integrity(IntegrityError::ChipIdMismatch))
        );
    }

    #[test]
    fn measurement_without_init_loads_calibration() {
        let mut sensor = Bme688::new(loaded_bus(), SimDelay::new(), None);
        let set = sensor.take_measurement().unwrap();
        assert_eq!(set.get("pressure"), Some("99569.224817"));
        assert_eq!(sensor.calibration(), Some(&reference_calibration()));
    }

    #[test]
    fn selector_failure_is_fatal() {
        let mut bus = loaded_bus();
        bus.fail_next(SimFailure::Write);
        let mut sensor = Bme688::new(bus, SimDelay::new(), None);
        assert_eq!(
            sensor.initialize(),
            Err(Fault::Transport(TransportError::SelectFailed))
        );
    }

    #[test]
    fn repeated_acquisitions_are_identical() {
        let mut sensor = Bme688::new(loaded_bus(), SimDelay::new(), None);
        sensor.initialize().unwrap();
        assert_eq!(sensor.take_measurement(), sensor.take_measurement());
    }
}
