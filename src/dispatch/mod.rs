//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! service.rs (FormatService)
//!     → routing table lookup
//!     → correlator.rs (token + pending reply)
//!     → gate.rs (first use of a rule set? cold : warm)
//!         cold → serial.rs (one dedicated worker, FIFO)
//!         warm → tokio blocking pool
//!     → correlator.rs (fulfill) → handler
//! ```
//!
//! # Design Decisions
//! - No global state: every table is owned by one component and passed by handle
//! - The gate's lock covers bookkeeping only, never formatting work
//! - Failures stay with the request that caused them

pub mod correlator;
pub mod gate;
pub mod serial;
pub mod service;

use thiserror::Error;

use crate::rules::FormatError;

pub use correlator::{PendingReply, ReplyCorrelator, ReplyToken};
pub use gate::{ColdStartGate, ColdStartSignal};
pub use serial::{SerialError, SerialExecutor, WORKER_THREAD_NAME};
pub use service::{DispatchStats, FormatReply, FormatRequest, FormatService};

/// Errors raised while running a unit of formatting work.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error("formatter panicked: {0}")]
    Panicked(String),

    #[error("formatting task failed: {0}")]
    Join(String),
}
