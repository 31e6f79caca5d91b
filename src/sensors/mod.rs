//! Sensor subsystem: the driver families and their shared output type.
//!
//! Every driver implements [`SensorPort`](crate::app::ports::SensorPort)
//! and hands back a freshly built [`MeasurementSet`] on each acquisition.
//! The fitted family is chosen at build time through
//! [`NodeConfig::sensor`](crate::config::NodeConfig) and constructed by
//! [`build`].

pub mod bme688;
pub mod crc;
pub mod sht;

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use crate::app::ports::SensorPort;
use crate::config::NodeConfig;
use bme688::Bme688;
use sht::{ShtModel, ShtSensor};

/// Sensor families this firmware can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorModel {
    Sht3x,
    Sht4x,
    Bme688,
}

/// Exposition metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
}

impl MetricKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
        }
    }
}

/// One named reading, already formatted for exposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub name: &'static str,
    pub kind: MetricKind,
    pub value: String,
}

impl Measurement {
    /// A gauge whose value is rendered with six fixed decimals.
    pub fn gauge(name: &'static str, value: f64) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            value: format_value(value),
        }
    }

    /// A gauge with a pre-formatted value.
    pub fn gauge_text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            value: value.into(),
        }
    }
}

/// Ordered readings from one acquisition.
///
/// The order and names are fixed per sensor family; the set is rebuilt on
/// every acquisition and never shared between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementSet {
    items: Vec<Measurement>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.items.push(measurement);
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Measurement> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Value of the metric called `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }
}

impl FromIterator<Measurement> for MeasurementSet {
    fn from_iter<T: IntoIterator<Item = Measurement>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MeasurementSet {
    type Item = &'a Measurement;
    type IntoIter = core::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Fixed-point decimal, six places, never scientific.
pub fn format_value(value: f64) -> String {
    let mut s = String::new();
    // Writing into a String cannot fail.
    let _ = write!(s, "{:.6}", value);
    s
}

/// Construct the driver for `model` on top of the given bus and delay.
pub fn build<'a, I, D>(model: SensorModel, i2c: I, delay: D, config: &NodeConfig) -> Box<dyn SensorPort + 'a>
where
    I: I2c + 'a,
    D: DelayNs + 'a,
{
    match model {
        SensorModel::Sht3x => Box::new(ShtSensor::new(ShtModel::Sht3x, i2c, delay)),
        SensorModel::Sht4x => Box::new(ShtSensor::new(ShtModel::Sht4x, i2c, delay)),
        SensorModel::Bme688 => Box::new(Bme688::new(i2c, delay, config.ready_poll_limit)),
    }
}
