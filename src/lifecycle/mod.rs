//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build routing table → Start serialized lane → Bind listener → Listening
//!
//! Shutdown (shutdown.rs):
//!     /stop, signal or serve error → Draining
//!     → stop accepting → wait in-flight (bounded) → drain serialized lane
//!     → remove socket file → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Draining
//! ```
//!
//! # Design Decisions
//! - Ordered startup: routing table first, listener last
//! - States only move forward; Stopped is terminal
//! - Draining has a timeout: the daemon stops even if a request hangs

pub mod shutdown;
pub mod signals;
pub mod startup;

use thiserror::Error;

use crate::net::ListenerError;
use crate::routing::RoutingError;

pub use shutdown::{DaemonState, InFlightGuard, ShutdownController};
pub use startup::{start, Daemon};

/// Fatal daemon errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start serialized lane: {0}")]
    Lane(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
