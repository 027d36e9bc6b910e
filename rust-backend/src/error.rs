use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the embedded backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The server was asked to stop before it started listening.
    #[error("server closed")]
    ServerClosed,

    #[error("failed to prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend was never bootstrapped")]
    NotBootstrapped,
}

impl BackendError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
