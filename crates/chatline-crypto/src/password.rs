//! Salts, digests, and the hashing function that ties them together.

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Salt size in bytes.
pub const SALT_LEN: usize = 16;

/// SHA-256 digest size in bytes.
pub const HASH_LEN: usize = 32;

/// Per-account random salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Wrap raw salt bytes.
    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex rendering, as stored in the account file.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex rendering produced by [`Salt::to_hex`].
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed(text).map(Self)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

/// SHA-256 digest of a salted password.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PasswordHash([u8; HASH_LEN]);

impl PasswordHash {
    /// Lowercase hex rendering, as stored in the account file.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex rendering produced by [`PasswordHash::to_hex`].
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed(text).map(Self)
    }

    /// Whether `password` hashed with `salt` reproduces this digest.
    pub fn verify(&self, password: &str, salt: &Salt) -> bool {
        hash_password(password, salt) == *self
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordHash({})", self.to_hex())
    }
}

/// Fresh salt from the OS CSPRNG.
///
/// Every call draws new entropy; salts are never derived from one another.
pub fn generate_salt() -> Result<Salt, CryptoError> {
    let mut bytes = [0u8; SALT_LEN];
    getrandom::fill(&mut bytes).map_err(|e| CryptoError::Entropy(e.to_string()))?;
    Ok(Salt(bytes))
}

/// Deterministic salted digest of `password`.
///
/// Same inputs always give the same digest.
pub fn hash_password(password: &str, salt: &Salt) -> PasswordHash {
    let salt_hex = salt.to_hex();

    let mut input = Zeroizing::new(Vec::with_capacity(salt_hex.len() + password.len()));
    input.extend_from_slice(salt_hex.as_bytes());
    input.extend_from_slice(password.as_bytes());

    let digest = Sha256::digest(input.as_slice());

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    PasswordHash(out)
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(text)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength { expected: N, got })
}
