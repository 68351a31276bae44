//! Server error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that end server startup or a single connection.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, zero-sized limits, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (read or write failure, peer reset).
    ///
    /// Fatal for the connection it occurred on; other clients are unaffected.
    #[error("transport error: {0}")]
    Transport(String),

    /// Account storage could not be read at startup.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected state. Indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
