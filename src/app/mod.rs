//! Application core: the node service loop and its port traits.
//!
//! Everything here is hardware-agnostic. Sensors, sockets, the radio and
//! the status LED are reached only through the traits in [`ports`], so the
//! whole request path runs on the host against mocks.

pub mod ports;
pub mod service;

pub use service::{NodeService, connect_with_retry};
