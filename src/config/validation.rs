//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Exactly one listener binding
//! - Validate value ranges (limits > 0, addresses parse)
//! - Check that every rule set compiles (globs, regexes, encoding)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{DaemonConfig, StepConfig};
use crate::rules::TextEncoding;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no listener configured: set exactly one of listener.bind_address or listener.unix_socket")]
    NoListener,

    #[error("both listener.bind_address and listener.unix_socket are set; choose one")]
    ConflictingListeners,

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("dispatch.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("rule set #{0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate rule set name {0:?}")]
    DuplicateName(String),

    #[error("rule set {0:?} has no target globs")]
    EmptyTarget(String),

    #[error("rule set {name:?}: invalid glob {glob:?}: {reason}")]
    InvalidGlob { name: String, glob: String, reason: String },

    #[error("rule set {name:?}: unsupported encoding {encoding:?}")]
    UnknownEncoding { name: String, encoding: String },

    #[error("rule set {name:?}: invalid regex {pattern:?}: {reason}")]
    InvalidRegex { name: String, pattern: String, reason: String },

    #[error("rule set {0:?}: indent width must be greater than zero")]
    ZeroIndentWidth(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match (&config.listener.bind_address, &config.listener.unix_socket) {
        (None, None) => errors.push(ValidationError::NoListener),
        (Some(_), Some(_)) => errors.push(ValidationError::ConflictingListeners),
        (Some(addr), None) => {
            if addr.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::InvalidBindAddress(addr.clone()));
            }
        }
        (None, Some(_)) => {}
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    let dispatch = &config.dispatch;
    if dispatch.serial_queue_capacity == 0 {
        errors.push(ValidationError::ZeroLimit("serial_queue_capacity"));
    }
    if dispatch.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroLimit("request_timeout_secs"));
    }
    if dispatch.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("max_body_bytes"));
    }
    if dispatch.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroLimit("drain_timeout_secs"));
    }

    let mut seen = HashSet::new();
    for (index, rule_set) in config.rule_sets.iter().enumerate() {
        let name = &rule_set.name;
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(index));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateName(name.clone()));
        }

        if rule_set.target.is_empty() {
            errors.push(ValidationError::EmptyTarget(name.clone()));
        }
        for glob in rule_set.target.iter().chain(&rule_set.exclude) {
            if let Err(e) = globset::Glob::new(glob) {
                errors.push(ValidationError::InvalidGlob {
                    name: name.clone(),
                    glob: glob.clone(),
                    reason: e.kind().to_string(),
                });
            }
        }

        if TextEncoding::from_name(&rule_set.encoding).is_none() {
            errors.push(ValidationError::UnknownEncoding {
                name: name.clone(),
                encoding: rule_set.encoding.clone(),
            });
        }

        for step in &rule_set.steps {
            match step {
                StepConfig::ReplaceRegex { pattern, .. } => {
                    if let Err(e) = regex::Regex::new(pattern) {
                        errors.push(ValidationError::InvalidRegex {
                            name: name.clone(),
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
                StepConfig::Indent { width: 0, .. } => {
                    errors.push(ValidationError::ZeroIndentWidth(name.clone()));
                }
                _ => {}
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
