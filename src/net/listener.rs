//! Listener binding: TCP address or unix domain socket.
//!
//! # Responsibilities
//! - Bind exactly one configured endpoint
//! - Clear a stale socket file left by an earlier run
//! - Remove the socket file once the daemon stops
//!
//! # Design Decisions
//! - A socket file that still accepts connections belongs to a live daemon
//!   and is never removed
//! - Configuration with zero or two endpoints is rejected here as well as
//!   in validation, so callers building configs by hand get the same rule

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("no listener configured: set exactly one of bind_address or unix_socket")]
    NotConfigured,

    #[error("both bind_address and unix_socket are configured")]
    Conflicting,

    #[error("invalid bind address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("socket {0} is in use by a running process")]
    SocketInUse(PathBuf),

    #[error("{0} exists and is not a socket")]
    NotASocket(PathBuf),

    #[error("unix sockets are not supported on this platform")]
    UnixUnsupported,
}

/// Where the daemon is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// A bound listener, ready to be served.
#[derive(Debug)]
pub enum BoundListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
}

impl BoundListener {
    /// Bind the configured endpoint.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        match (&config.bind_address, &config.unix_socket) {
            (Some(_), Some(_)) => Err(ListenerError::Conflicting),
            (None, None) => Err(ListenerError::NotConfigured),
            (Some(address), None) => Self::bind_tcp(address).await,
            (None, Some(path)) => Self::bind_unix(path).await,
        }
    }

    async fn bind_tcp(address: &str) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| ListenerError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|source| ListenerError::Bind {
            endpoint: address.to_string(),
            source,
        })?;
        let local = listener.local_addr().map_err(|source| ListenerError::Bind {
            endpoint: address.to_string(),
            source,
        })?;
        tracing::info!(address = %local, "Listener bound");
        Ok(Self::Tcp(listener))
    }

    #[cfg(unix)]
    async fn bind_unix(path: &Path) -> Result<Self, ListenerError> {
        clear_stale_socket(path).await?;
        let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
            endpoint: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Listener bound");
        Ok(Self::Unix {
            listener,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    async fn bind_unix(_path: &Path) -> Result<Self, ListenerError> {
        Err(ListenerError::UnixUnsupported)
    }

    /// The endpoint clients should connect to. For TCP this carries the
    /// actual port when bound to port 0.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => Endpoint::Tcp(addr),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read local address");
                    Endpoint::Tcp(SocketAddr::from(([0, 0, 0, 0], 0)))
                }
            },
            #[cfg(unix)]
            Self::Unix { path, .. } => Endpoint::Unix(path.clone()),
        }
    }
}

/// Remove a leftover socket file whose owner is gone.
#[cfg(unix)]
async fn clear_stale_socket(path: &Path) -> Result<(), ListenerError> {
    use std::os::unix::fs::FileTypeExt;

    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::Bind {
                endpoint: path.display().to_string(),
                source,
            })
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket(path.to_path_buf()));
    }
    if tokio::net::UnixStream::connect(path).await.is_ok() {
        return Err(ListenerError::SocketInUse(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), "Removing stale socket file");
    tokio::fs::remove_file(path).await.map_err(|source| ListenerError::Bind {
        endpoint: path.display().to_string(),
        source,
    })
}

/// Remove the socket file of a unix endpoint after the server stopped.
pub async fn cleanup(endpoint: &Endpoint) {
    if let Endpoint::Unix(path) = endpoint {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Socket file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(address: &str) -> ListenerConfig {
        ListenerConfig {
            bind_address: Some(address.to_string()),
            unix_socket: None,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_tcp_port() {
        let listener = BoundListener::bind(&tcp("127.0.0.1:0")).await.unwrap();
        match listener.endpoint() {
            Endpoint::Tcp(addr) => assert_ne!(addr.port(), 0),
            other => panic!("unexpected endpoint {other}"),
        }
    }

    #[tokio::test]
    async fn requires_exactly_one_endpoint() {
        let none = BoundListener::bind(&ListenerConfig::default()).await.unwrap_err();
        assert!(matches!(none, ListenerError::NotConfigured));

        let both = ListenerConfig {
            bind_address: Some("127.0.0.1:0".to_string()),
            unix_socket: Some(PathBuf::from("/tmp/x.sock")),
        };
        assert!(matches!(BoundListener::bind(&both).await.unwrap_err(), ListenerError::Conflicting));

        let bad = BoundListener::bind(&tcp("localhost")).await.unwrap_err();
        assert!(matches!(bad, ListenerError::InvalidAddress { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_socket_is_replaced_and_live_socket_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let config = ListenerConfig {
            bind_address: None,
            unix_socket: Some(path.clone()),
        };

        // A socket file nobody listens on.
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let live = BoundListener::bind(&config).await.unwrap();
        assert_eq!(live.endpoint(), Endpoint::Unix(path.clone()));

        let err = BoundListener::bind(&config).await.unwrap_err();
        assert!(matches!(err, ListenerError::SocketInUse(_)));

        drop(live);
        cleanup(&Endpoint::Unix(path.clone())).await;
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regular_file_is_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, "data").unwrap();

        let config = ListenerConfig {
            bind_address: None,
            unix_socket: Some(path.clone()),
        };
        let err = BoundListener::bind(&config).await.unwrap_err();
        assert!(matches!(err, ListenerError::NotASocket(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
    }
}
