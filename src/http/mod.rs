//! Metrics endpoint: one plain HTTP/1.1 response per connection.
//!
//! ```text
//!  accept ──▶ Listener ──take_measurement──▶ SensorPort
//!                │
//!                ├── exposition::render ──▶ response bytes
//!                │
//!                └── ResponseSession ──write/ack──▶ Connection
//! ```

pub mod exposition;
pub mod listener;
pub mod session;

pub use listener::Listener;
pub use session::{AckOutcome, ResponseSession};
