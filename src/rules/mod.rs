//! Formatting rules subsystem.
//!
//! # Data Flow
//! ```text
//! RuleSetConfig (from config)
//!     → rule_set.rs (RuleSet: identity, encoding, line endings, steps)
//!     → first use: steps.rs compiles the step chain (cold start)
//!     → engine.rs applies the chain to request content
//!     → state.rs (CanonicalState: clean / changed / did not converge)
//! ```
//!
//! # Design Decisions
//! - RuleSets are identified by arena index, never compared structurally
//! - Preparation is lazy; only successful preparation is cached
//! - The engine is a trait so the daemon does not depend on step details

pub mod encoding;
pub mod engine;
pub mod rule_set;
pub mod state;
pub mod steps;

use thiserror::Error;

pub use encoding::TextEncoding;
pub use engine::{FormatEngine, StepEngine};
pub use rule_set::{RuleSet, RuleSetId};
pub use state::CanonicalState;

/// Errors raised while preparing or applying a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The rule set could not be prepared (cold start failed).
    #[error("failed to prepare rule set: {0}")]
    Preparation(String),

    #[error("unsupported encoding {0:?}")]
    UnknownEncoding(String),

    /// The engine failed while applying the rule set.
    #[error("{0}")]
    Engine(String),
}
