//! Append-only account file.
//!
//! One record per line, fields separated by single spaces:
//!
//! ```text
//! <identity> <salt-hex>:<hash-hex> <display-name> <email>
//! ```
//!
//! No field may contain whitespace. Lines in older layouts (`id pw`,
//! `id pw name email`) carry no salt and are skipped on load with a warning.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chatline_crypto::{PasswordHash, Salt};

use super::{AccountStorage, StorageError};
use crate::accounts::AccountRecord;

/// Account records in a plain text file.
///
/// Appends are serialized through an internal lock and synced to disk
/// before returning.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl FileStorage {
    /// Storage backed by the file at `path`. The file is created on first
    /// append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), append_lock: Mutex::new(()) }
    }

    /// Location of the account file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccountStorage for FileStorage {
    fn load_records(&self) -> Result<Vec<AccountRecord>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no account file, starting empty");
                return Ok(Vec::new());
            },
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut records = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match decode_record(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping unreadable account record"
                ),
            }
        }

        Ok(records)
    }

    fn append_record(&self, record: &AccountRecord) -> Result<(), StorageError> {
        let _guard = self.append_lock.lock().expect("Mutex poisoned");

        let mut line = encode_record(record);
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        Ok(())
    }
}

/// Render a record as one account file line (no trailing newline).
pub fn encode_record(record: &AccountRecord) -> String {
    format!(
        "{} {}:{} {} {}",
        record.identity,
        record.salt.to_hex(),
        record.password_hash.to_hex(),
        record.display_name,
        record.email
    )
}

/// Parse one account file line.
///
/// Tokens after the email are ignored.
pub fn decode_record(line: &str) -> Result<AccountRecord, StorageError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [identity, credential, display_name, email, ..] = fields.as_slice() else {
        return Err(StorageError::Corrupt(format!("expected 4 fields, found {}", fields.len())));
    };

    let Some((salt_hex, hash_hex)) = credential.split_once(':') else {
        return Err(StorageError::Corrupt("unsalted legacy credential".to_string()));
    };

    let salt = Salt::from_hex(salt_hex)
        .map_err(|e| StorageError::Corrupt(format!("bad salt: {e}")))?;
    let password_hash = PasswordHash::from_hex(hash_hex)
        .map_err(|e| StorageError::Corrupt(format!("bad password hash: {e}")))?;

    Ok(AccountRecord {
        identity: (*identity).to_string(),
        salt,
        password_hash,
        display_name: (*display_name).to_string(),
        email: (*email).to_string(),
    })
}
