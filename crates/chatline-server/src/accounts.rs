//! Account store: registered identities and their credentials.
//!
//! The full account table lives in memory behind one mutex and is loaded
//! wholesale at startup. Registration is check-and-insert under that mutex,
//! and the durable append happens before the in-memory insert while the lock
//! is still held. Readers therefore never see an account that is not yet on
//! disk, and two concurrent registrations of one identity cannot both
//! succeed.
//!
//! A storage log with duplicate identities (only possible through manual
//! edits) loads as last-write-wins.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{collections::HashMap, sync::Mutex};

use chatline_crypto::{CryptoError, PasswordHash, Salt, generate_salt, hash_password};
use thiserror::Error;

use crate::storage::{AccountStorage, StorageError};

/// One registered account.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Unique login name
    pub identity: String,
    /// Random per-account salt
    pub salt: Salt,
    /// Digest of the salted password
    pub password_hash: PasswordHash,
    /// Name shown to other users
    pub display_name: String,
    /// Contact address
    pub email: String,
}

/// Why a registration was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// Identity already has an account
    #[error("identity already registered: {0}")]
    DuplicateIdentity(String),

    /// A field is empty or contains whitespace
    #[error("invalid {field}: must be non-empty without whitespace")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
    },

    /// No salt could be generated
    #[error("salt generation failed: {0}")]
    Entropy(#[from] CryptoError),

    /// Record could not be appended durably
    #[error("account storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Why a login was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No account with this identity
    #[error("unknown account: {0}")]
    AccountUnknown(String),

    /// Account exists but the password is wrong
    #[error("password mismatch for {0}")]
    PasswordMismatch(String),
}

/// Registered accounts, shared by every connection.
pub struct AccountStore<S: AccountStorage> {
    accounts: Mutex<HashMap<String, AccountRecord>>,
    storage: S,
}

impl<S: AccountStorage> AccountStore<S> {
    /// Build the store from everything `storage` holds.
    ///
    /// Unreadable records are skipped by the backend; a missing file is an
    /// empty store.
    pub fn load(storage: S) -> Result<Self, StorageError> {
        let records = storage.load_records()?;

        let mut accounts = HashMap::with_capacity(records.len());
        for record in records {
            accounts.insert(record.identity.clone(), record);
        }

        Ok(Self { accounts: Mutex::new(accounts), storage })
    }

    /// Whether `identity` is registered.
    pub fn exists(&self, identity: &str) -> bool {
        self.accounts.lock().expect("Mutex poisoned").contains_key(identity)
    }

    /// Create an account if `identity` is free.
    ///
    /// Check, durable append, and insert are one indivisible step with
    /// respect to other callers. On any error nothing is stored.
    pub fn try_register(
        &self,
        identity: &str,
        password: &str,
        display_name: &str,
        email: &str,
    ) -> Result<(), RegisterError> {
        validate_field("identity", identity)?;
        validate_field("display name", display_name)?;
        validate_field("email", email)?;

        let mut accounts = self.accounts.lock().expect("Mutex poisoned");
        if accounts.contains_key(identity) {
            return Err(RegisterError::DuplicateIdentity(identity.to_string()));
        }

        let salt = generate_salt()?;
        let record = AccountRecord {
            identity: identity.to_string(),
            salt,
            password_hash: hash_password(password, &salt),
            display_name: display_name.to_string(),
            email: email.to_string(),
        };

        self.storage.append_record(&record)?;
        accounts.insert(record.identity.clone(), record);

        Ok(())
    }

    /// Check `password` against the stored digest for `identity`.
    ///
    /// A registered identity with a wrong password is always
    /// `PasswordMismatch`, never `AccountUnknown`.
    pub fn authenticate(&self, identity: &str, password: &str) -> Result<AccountRecord, AuthError> {
        let record = self
            .accounts
            .lock()
            .expect("Mutex poisoned")
            .get(identity)
            .cloned()
            .ok_or_else(|| AuthError::AccountUnknown(identity.to_string()))?;

        if record.password_hash.verify(password, &record.salt) {
            Ok(record)
        } else {
            Err(AuthError::PasswordMismatch(identity.to_string()))
        }
    }

    /// Stored record for `identity`.
    pub fn get(&self, identity: &str) -> Option<AccountRecord> {
        self.accounts.lock().expect("Mutex poisoned").get(identity).cloned()
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.accounts.lock().expect("Mutex poisoned").len()
    }

    /// Whether no accounts are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn validate_field(field: &'static str, value: &str) -> Result<(), RegisterError> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(RegisterError::InvalidField { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::storage::MemoryStorage;

    /// Backend whose appends always fail.
    struct BrokenStorage;

    impl AccountStorage for BrokenStorage {
        fn load_records(&self) -> Result<Vec<AccountRecord>, StorageError> {
            Ok(Vec::new())
        }

        fn append_record(&self, _record: &AccountRecord) -> Result<(), StorageError> {
            Err(StorageError::Io("disk full".to_string()))
        }
    }

    fn empty_store() -> AccountStore<MemoryStorage> {
        AccountStore::load(MemoryStorage::new()).unwrap()
    }

    #[test]
    fn register_then_exists() {
        let store = empty_store();
        assert!(!store.exists("alice"));

        store.try_register("alice", "pw1", "Alice", "alice@example.org").unwrap();

        assert!(store.exists("alice"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.storage().len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected_without_mutation() {
        let store = empty_store();
        store.try_register("alice", "pw1", "Alice", "alice@example.org").unwrap();
        let original = store.get("alice").unwrap();

        let result = store.try_register("alice", "other", "Mallory", "m@example.org");

        assert_eq!(result, Err(RegisterError::DuplicateIdentity("alice".to_string())));
        assert_eq!(store.get("alice").unwrap(), original);
        assert_eq!(store.storage().len(), 1);
    }

    #[test]
    fn authenticate_distinguishes_unknown_and_mismatch() {
        let store = empty_store();
        store.try_register("alice", "pw1", "Alice", "alice@example.org").unwrap();

        assert_eq!(
            store.authenticate("bob", "pw1"),
            Err(AuthError::AccountUnknown("bob".to_string()))
        );
        assert_eq!(
            store.authenticate("alice", "pw2"),
            Err(AuthError::PasswordMismatch("alice".to_string()))
        );

        let record = store.authenticate("alice", "pw1").unwrap();
        assert_eq!(record.display_name, "Alice");
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let store = empty_store();
        store.try_register("alice", "hunter2", "Alice", "alice@example.org").unwrap();

        let line = crate::storage::encode_record(&store.get("alice").unwrap());
        assert!(!line.contains("hunter2"));
    }

    #[test]
    fn fields_with_whitespace_are_rejected() {
        let store = empty_store();

        assert_eq!(
            store.try_register("al ice", "pw", "Alice", "a@b"),
            Err(RegisterError::InvalidField { field: "identity" })
        );
        assert_eq!(
            store.try_register("alice", "pw", "", "a@b"),
            Err(RegisterError::InvalidField { field: "display name" })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn failed_append_leaves_account_unregistered() {
        let store = AccountStore::load(BrokenStorage).unwrap();

        let result = store.try_register("alice", "pw1", "Alice", "alice@example.org");

        assert!(matches!(result, Err(RegisterError::Storage(_))));
        assert!(!store.exists("alice"));
    }

    #[test]
    fn load_is_last_write_wins_for_duplicates() {
        let first = {
            let store = empty_store();
            store.try_register("alice", "old", "Old", "old@example.org").unwrap();
            store.get("alice").unwrap()
        };
        let second = {
            let store = empty_store();
            store.try_register("alice", "new", "New", "new@example.org").unwrap();
            store.get("alice").unwrap()
        };

        let store =
            AccountStore::load(MemoryStorage::with_records(vec![first, second.clone()])).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("alice").unwrap(), second);
        assert!(store.authenticate("alice", "new").is_ok());
    }

    #[test]
    fn concurrent_registration_has_exactly_one_winner() {
        let store = Arc::new(empty_store());

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        store.try_register("alice", &format!("pw{i}"), "Alice", "a@example.org")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(RegisterError::DuplicateIdentity(_))))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(store.storage().len(), 1);
    }
}
