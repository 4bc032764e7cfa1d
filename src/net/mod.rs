//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (exactly one endpoint)
//!     → listener.rs (bind TCP address or unix socket)
//!     → BoundListener handed to the HTTP server
//!     → after stop: socket file removed
//! ```

pub mod listener;

pub use listener::{cleanup, BoundListener, Endpoint, ListenerError};
