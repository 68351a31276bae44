#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::sync::{Arc, Mutex};

use super::{AccountStorage, StorageError};
use crate::accounts::AccountRecord;

/// In-memory storage implementation for testing
///
/// Clones share the same record log, so a test can keep a handle and inspect
/// what the account store appended.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<Mutex<Vec<AccountRecord>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with `records`, as if loaded from disk.
    pub fn with_records(records: Vec<AccountRecord>) -> Self {
        Self { records: Arc::new(Mutex::new(records)) }
    }

    /// Snapshot of every appended record.
    pub fn records(&self) -> Vec<AccountRecord> {
        self.records.lock().expect("Mutex poisoned").clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().expect("Mutex poisoned").len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountStorage for MemoryStorage {
    fn load_records(&self) -> Result<Vec<AccountRecord>, StorageError> {
        Ok(self.records())
    }

    fn append_record(&self, record: &AccountRecord) -> Result<(), StorageError> {
        self.records.lock().expect("Mutex poisoned").push(record.clone());
        Ok(())
    }
}
