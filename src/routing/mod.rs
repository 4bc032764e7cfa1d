//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path (relative or absolute)
//!     → table.rs (candidate interpretations, ordered entry scan)
//!     → membership.rs (set membership test)
//!     → Return: matched RuleSet or not covered
//!
//! Table construction (at startup):
//!     RuleSetConfig[]
//!     → Walk each build unit dir, expand globs into MembershipSets
//!     → Order entries child-before-ancestor
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Table built once before the listener starts, immutable at runtime
//! - Deterministic: same input always resolves to the same rule set
//! - First match wins (ordered by build unit depth)

pub mod membership;
pub mod table;

use std::path::PathBuf;

use thiserror::Error;

use crate::rules::RuleSetId;

pub use membership::MembershipSet;
pub use table::{RoutingEntry, RoutingTable};

/// Errors raised while building the routing table.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("project root {path} is not accessible: {source}")]
    ProjectRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob {pattern:?}: {reason}")]
    Glob { pattern: String, reason: String },

    #[error("rule set {name:?}: {reason}")]
    RuleSet { name: String, reason: String },

    #[error("rule set id {0} registered twice")]
    DuplicateRuleSetId(RuleSetId),
}
