//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters or simulated devices. All tests run on the host
//! with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod loopback_tests;
mod mock_hw;
mod node_service_tests;
