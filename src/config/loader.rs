//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Listen on `127.0.0.1:<port>` instead of the configured binding.
    pub port: Option<u16>,
    /// Listen on this unix socket instead of the configured binding.
    pub unix_socket: Option<PathBuf>,
    /// Replace the configured project root.
    pub project_root: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Apply the overrides. A port and a socket given together both survive,
    /// so validation reports the conflict.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = Some(format!("127.0.0.1:{port}"));
            if self.unix_socket.is_none() {
                config.listener.unix_socket = None;
            }
        }
        if let Some(socket) = &self.unix_socket {
            config.listener.unix_socket = Some(socket.clone());
            if self.port.is_none() {
                config.listener.bind_address = None;
            }
        }
        if let Some(root) = &self.project_root {
            config.project_root = root.clone();
        }
    }
}

/// Load and validate configuration from a TOML file.
///
/// A relative `project_root` is resolved against the directory holding the
/// config file.
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&content)?;

    if config.project_root.is_relative() && overrides.project_root.is_none() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.project_root = base.join(&config.project_root);
    }
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<DaemonConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}
