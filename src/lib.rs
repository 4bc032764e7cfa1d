//! Format daemon library.
//!
//! A long-running process that formats file content on request, so editors
//! and scripts avoid paying formatter start-up cost on every call.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    FORMAT DAEMON                      │
//!                    │                                                       │
//!   Client Request   │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!   ─────────────────┼─▶│   net   │───▶│  http   │───▶│   routing    │      │
//!                    │  │listener │    │ server  │    │    table     │      │
//!                    │  └─────────┘    └─────────┘    └──────┬───────┘      │
//!                    │                                       │              │
//!                    │                                       ▼              │
//!                    │                  ┌────────────────────────────────┐  │
//!                    │                  │            dispatch            │  │
//!                    │                  │ gate → serial lane | blocking  │  │
//!                    │                  │       pool → correlator        │  │
//!                    │                  └───────────────┬────────────────┘  │
//!                    │                                  ▼                   │
//!   Client Response  │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!   ◀────────────────┼──│response │◀───│ reply   │◀───│    rules     │      │
//!                    │  │ mapping │    │         │    │   engine     │      │
//!                    │  └─────────┘    └─────────┘    └──────────────┘      │
//!                    │                                                       │
//!                    │  Cross-cutting: config · lifecycle · observability    │
//!                    └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod rules;

pub use config::DaemonConfig;
pub use dispatch::{FormatReply, FormatRequest, FormatService};
pub use http::DaemonServer;
pub use lifecycle::{start, Daemon, DaemonError, DaemonState, ShutdownController};
pub use routing::RoutingTable;
pub use rules::{FormatEngine, StepEngine};
