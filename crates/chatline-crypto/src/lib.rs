//! Chatline credential hashing.
//!
//! Passwords are never stored. Each account keeps a random [`Salt`] and the
//! SHA-256 digest of the salt's lowercase hex text followed by the password's
//! UTF-8 bytes:
//!
//! ```text
//! digest = SHA-256( hex(salt) || password )
//! ```
//!
//! Hashing the hex text rather than the raw salt bytes keeps account files
//! written by earlier server generations verifiable.
//!
//! # Security
//!
//! - Salts are 16 bytes from the OS CSPRNG, so identical passwords produce
//!   unrelated digests and precomputed tables are useless.
//! - The digest input buffer holds the plaintext password and is zeroized
//!   after hashing.
//! - Comparison is plain byte equality; timing side channels are not
//!   addressed.

#![forbid(unsafe_code)]

mod error;
mod password;

pub use error::CryptoError;
pub use password::{HASH_LEN, PasswordHash, SALT_LEN, Salt, generate_salt, hash_password};
