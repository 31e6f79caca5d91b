//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements           | Connects to                 |
//! |---------|----------------------|-----------------------------|
//! | `tcp`   | Acceptor, Connection | `std::net` sockets (lwIP)   |
//! | `wifi`  | ConnectivityPort     | ESP-IDF WiFi STA            |
//! | `mdns`  | (service discovery)  | ESP-IDF mDNS responder      |
//! | `time`  | (uptime clock)       | ESP32 high-resolution timer |

pub mod mdns;
pub mod tcp;
pub mod time;
pub(super) mod utils;
pub mod wifi;
