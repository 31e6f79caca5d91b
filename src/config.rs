//! Node configuration parameters.
//!
//! Everything here is fixed at build time: defaults below, network
//! credentials from `WLAN_SSID` / `WLAN_PASS`, and an optional JSON override
//! document from `NODE_CONFIG`. Nothing is persisted on the device.

use serde::{Deserialize, Serialize};

use crate::sensors::SensorModel;

/// Core node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Sensor ---
    /// Sensor family fitted to this node.
    pub sensor: SensorModel,
    /// I2C bus clock in Hz.
    pub i2c_frequency_hz: u32,
    /// Maximum readiness polls before giving up. `None` waits indefinitely.
    pub ready_poll_limit: Option<u32>,

    // --- HTTP ---
    /// TCP port the metrics endpoint listens on.
    pub tcp_port: u16,
    /// Bytes the socket adapter may hold unacknowledged (send window).
    pub send_buffer_bytes: usize,
    /// Sleep between iterations of the service loop (milliseconds).
    pub loop_sleep_ms: u32,

    // --- WLAN ---
    pub wlan_ssid: String,
    pub wlan_password: String,
    /// Delay between association attempts (milliseconds).
    pub wlan_retry_delay_ms: u32,

    // --- Service discovery ---
    pub hostname: String,
    pub service_instance: String,
    pub service_type: String,
    /// Re-announcement period (seconds).
    pub announce_interval_secs: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor: SensorModel::Sht4x,
            i2c_frequency_hz: 100_000,
            ready_poll_limit: None,

            tcp_port: 80,
            send_buffer_bytes: 2920, // 2 × 1460-byte MSS
            loop_sleep_ms: 1,

            wlan_ssid: option_env!("WLAN_SSID").unwrap_or_default().into(),
            wlan_password: option_env!("WLAN_PASS").unwrap_or_default().into(),
            wlan_retry_delay_ms: 300_000, // 5 min

            hostname: "sensornode".into(),
            service_instance: "sensornode".into(),
            service_type: "_prometheus-http".into(),
            announce_interval_secs: 600, // 10 min
        }
    }
}

/// Errors from loading or validating a [`NodeConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The override document is not valid JSON for this schema.
    Malformed(serde_json::Error),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed config: {}", e),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl NodeConfig {
    /// Build the configuration from defaults plus an optional JSON override.
    ///
    /// Fields missing from the override keep their defaults.
    pub fn load(overrides: Option<&str>) -> Result<Self, ConfigError> {
        let config = match overrides {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str(json).map_err(ConfigError::Malformed)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the firmware cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tcp_port == 0 {
            return Err(ConfigError::ValidationFailed("tcp_port must be non-zero"));
        }
        if self.send_buffer_bytes == 0 {
            return Err(ConfigError::ValidationFailed("send_buffer_bytes must be non-zero"));
        }
        if self.i2c_frequency_hz == 0 {
            return Err(ConfigError::ValidationFailed("i2c_frequency_hz must be non-zero"));
        }
        if self.ready_poll_limit == Some(0) {
            return Err(ConfigError::ValidationFailed("ready_poll_limit must be at least 1"));
        }
        if self.hostname.is_empty() || self.hostname.len() > 24 {
            return Err(ConfigError::ValidationFailed("hostname must be 1-24 bytes"));
        }
        if self.service_type.is_empty() {
            return Err(ConfigError::ValidationFailed("service_type must be set"));
        }
        if self.announce_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("announce_interval_secs must be non-zero"));
        }
        Ok(())
    }
}
