//! Bus transport, status LED, and host-side device simulations.

pub mod led_patterns;
#[cfg(not(target_os = "espidf"))]
pub mod sim_bus;
pub mod status_led;
pub mod transport;
