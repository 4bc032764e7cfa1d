//! Typed async client for the format daemon's HTTP interface.

mod client;

pub use client::{ClientError, DaemonClient, DaemonStatus, FormatOutcome};
