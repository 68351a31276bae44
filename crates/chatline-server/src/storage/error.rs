//! Storage error types.
//!
//! - `Io`: the backing file could not be read or appended
//! - `Corrupt`: a stored record could not be decoded

use thiserror::Error;

/// Errors that can occur during account storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error (file system)
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored record is malformed
    ///
    /// Loading skips such records instead of failing; this variant surfaces
    /// only from direct decoding.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
