//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the format daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory request paths are resolved against.
    pub project_root: PathBuf,

    /// Listener configuration (TCP address or unix socket).
    pub listener: ListenerConfig,

    /// Request dispatch and draining limits.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Rule set definitions, one per format declared by a build unit.
    pub rule_sets: Vec<RuleSetConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            listener: ListenerConfig::default(),
            dispatch: DispatchConfig::default(),
            observability: ObservabilityConfig::default(),
            rule_sets: Vec::new(),
        }
    }
}

/// Listener configuration.
///
/// Exactly one of `bind_address` and `unix_socket` must be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// TCP bind address (e.g., "127.0.0.1:7878").
    pub bind_address: Option<String>,

    /// Filesystem path of a unix domain socket.
    pub unix_socket: Option<PathBuf>,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the serialized lane's queue. Submissions wait when full.
    pub serial_queue_capacity: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Upper bound on waiting for in-flight requests after a stop.
    pub drain_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            serial_queue_capacity: 64,
            request_timeout_secs: 60,
            max_body_bytes: 16 * 1024 * 1024,
            drain_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint. Metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

/// One rule set contributed by a build unit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleSetConfig {
    /// Rule set identifier for logging/metrics.
    pub name: String,

    /// Build unit directory, relative to the project root.
    #[serde(default = "default_unit_dir")]
    pub dir: PathBuf,

    /// Globs (relative to `dir`) selecting member files.
    pub target: Vec<String>,

    /// Globs (relative to `dir`) removed from the selection.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Text encoding name.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Line separator policy applied after all steps.
    #[serde(default)]
    pub line_endings: LineEndingsConfig,

    /// Ordered formatting steps.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

/// Line separator policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEndingsConfig {
    #[default]
    Unix,
    Windows,
    MacClassic,
    PlatformNative,
    Preserve,
}

/// Indentation style for the `indent` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentStyle {
    #[default]
    Spaces,
    Tabs,
}

/// A single formatting step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Strip whitespace at the end of every line.
    TrimTrailingWhitespace,

    /// Ensure the content ends with exactly one line separator.
    EndWithNewline,

    /// Rewrite leading indentation.
    Indent {
        #[serde(default)]
        style: IndentStyle,
        #[serde(default = "default_indent_width")]
        width: usize,
    },

    /// Literal search and replace.
    Replace { find: String, replacement: String },

    /// Regex search and replace (`$1` style group references).
    ReplaceRegex { pattern: String, replacement: String },
}

fn default_indent_width() -> usize {
    4
}
