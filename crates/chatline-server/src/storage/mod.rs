//! Storage abstraction for account records
//!
//! The account store keeps its working set in memory; a backend only has to
//! hand back every record at startup and durably append new ones. Records
//! are never rewritten or deleted, so an append-only log is enough.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::{FileStorage, decode_record, encode_record};
pub use memory::MemoryStorage;

use crate::accounts::AccountRecord;

/// Durable home for account records.
///
/// Synchronous: calls are short, run inside the account store's
/// critical section, and must not be interleaved with an `.await`.
pub trait AccountStorage: Send + Sync + 'static {
    /// Every readable record, in the order written.
    ///
    /// A missing backing store is an empty result, not an error. Records that
    /// cannot be decoded are skipped and logged.
    fn load_records(&self) -> Result<Vec<AccountRecord>, StorageError>;

    /// Durably append one record.
    ///
    /// # Invariants
    ///
    /// - Post: a subsequent `load_records` includes `record`
    fn append_record(&self, record: &AccountRecord) -> Result<(), StorageError>;
}
