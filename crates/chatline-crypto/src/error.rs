//! Error types for credential hashing.

use thiserror::Error;

/// Errors from salt generation and hex decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// OS entropy source failed
    ///
    /// Fatal for the registration that asked for a salt, not for the server.
    #[error("entropy source failure: {0}")]
    Entropy(String),

    /// Input was not valid hexadecimal
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded value had the wrong size
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Required size in bytes
        expected: usize,
        /// Size actually decoded
        got: usize,
    },
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}
