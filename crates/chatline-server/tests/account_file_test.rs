//! Persistence tests for `FileStorage`.
//!
//! These tests verify that accounts survive close/reopen cycles of the
//! account file, simulating server restarts.

use std::fs;

use chatline_crypto::{Salt, hash_password};
use chatline_server::{
    AccountStore, AuthError,
    storage::{AccountStorage, FileStorage},
};
use tempfile::tempdir;

#[test]
fn test_accounts_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accounts.dat");

    let account_count = 10;

    // Register, then simulate clean shutdown
    let written: Vec<_> = {
        let store = AccountStore::load(FileStorage::new(&path)).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.storage().path(), path.as_path());

        (0..account_count)
            .map(|i| {
                let identity = format!("user{i}");
                store
                    .try_register(&identity, &format!("pw{i}"), &format!("User{i}"), "u@x")
                    .unwrap();
                store.get(&identity).unwrap()
            })
            .collect()
    };

    // Reload: same records, salts and hashes byte for byte
    {
        let store = AccountStore::load(FileStorage::new(&path)).unwrap();
        assert_eq!(store.len(), account_count);

        for (i, before) in written.iter().enumerate() {
            assert_eq!(store.get(&before.identity).as_ref(), Some(before));

            let record = store.authenticate(&before.identity, &format!("pw{i}")).unwrap();
            assert_eq!(record.display_name, format!("User{i}"));
        }

        assert_eq!(
            store.authenticate("user0", "pw1"),
            Err(AuthError::PasswordMismatch("user0".to_string()))
        );
    }
}

#[test]
fn test_missing_file_is_empty_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.dat");

    let store = AccountStore::load(FileStorage::new(&path)).unwrap();

    assert!(store.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_file_created_on_first_registration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accounts.dat");

    let store = AccountStore::load(FileStorage::new(&path)).unwrap();
    store.try_register("alice", "pw1", "Alice", "alice@example.org").unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.starts_with("alice "));
    assert!(contents.ends_with("Alice alice@example.org\n"));
    assert!(!contents.contains("pw1"));
}

#[test]
fn test_duplicate_registration_not_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accounts.dat");

    {
        let store = AccountStore::load(FileStorage::new(&path)).unwrap();
        store.try_register("alice", "pw1", "Alice", "alice@example.org").unwrap();
        assert!(store.try_register("alice", "pw2", "Other", "other@example.org").is_err());
    }

    let store = AccountStore::load(FileStorage::new(&path)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.authenticate("alice", "pw1").is_ok());
}

#[test]
fn test_unreadable_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accounts.dat");

    let salt = Salt::from_bytes(core::array::from_fn(|i| i as u8));
    let hash = hash_password("pw1", &salt);
    let good = format!("alice {}:{} Alice alice@example.org", salt.to_hex(), hash.to_hex());

    let contents = [
        good.as_str(),
        // Unsalted legacy digest
        "bob 5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8 Bob bob@x",
        // Too few fields
        "carol deadbeef",
        "",
        "dave zz:zz Dave dave@x",
    ]
    .join("\n");
    fs::write(&path, contents).unwrap();

    let storage = FileStorage::new(&path);
    let records = storage.load_records().unwrap();
    assert_eq!(records.len(), 1);

    let store = AccountStore::load(storage).unwrap();
    assert!(store.authenticate("alice", "pw1").is_ok());
    assert_eq!(
        store.authenticate("bob", "password"),
        Err(AuthError::AccountUnknown("bob".to_string()))
    );
    assert!(!store.exists("carol"));
    assert!(!store.exists("dave"));
}

#[test]
fn test_appends_after_reload_keep_earlier_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accounts.dat");

    {
        let store = AccountStore::load(FileStorage::new(&path)).unwrap();
        store.try_register("alice", "pw1", "Alice", "a@x").unwrap();
    }
    {
        let store = AccountStore::load(FileStorage::new(&path)).unwrap();
        store.try_register("bob", "pw2", "Bob", "b@x").unwrap();
    }

    let store = AccountStore::load(FileStorage::new(&path)).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.authenticate("alice", "pw1").is_ok());
    assert!(store.authenticate("bob", "pw2").is_ok());
}
