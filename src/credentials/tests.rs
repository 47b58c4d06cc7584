//! Tests for Credential Store Module

use super::*;
use crate::core::error::CredentialError;
use proptest::prelude::*;
use tempfile::TempDir;

/// Create a store backed by a fresh temporary directory
fn create_test_store() -> (CredentialStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config").join("userconfig.json");
    let store = CredentialStore::load(&path);
    (store, temp_dir)
}

#[test]
fn test_fresh_install_creates_default_user() {
    let (store, _temp) = create_test_store();

    assert!(store.path().exists());
    assert_eq!(store.usernames(), vec![DEFAULT_USERNAME.to_string()]);
    assert!(store.verify("User", "1234"));
    assert_eq!(store.default_display_user(), "User");
}

#[test]
fn test_hash_is_hex_sha256() {
    assert_eq!(
        hash_password("1234"),
        "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
    );
}

#[test]
fn test_verify_rejects_wrong_password_and_unknown_user() {
    let (store, _temp) = create_test_store();

    assert!(!store.verify("User", "4321"));
    assert!(!store.verify("Nobody", "1234"));
    assert!(!store.verify("", ""));
}

#[test]
fn test_corrupt_file_falls_back_without_overwriting() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("userconfig.json");
    std::fs::write(&path, "{ users: oops").unwrap();

    let store = CredentialStore::load(&path);
    assert!(store.verify("User", "1234"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ users: oops");
}

#[test]
fn test_empty_user_list_gets_default_user() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("userconfig.json");
    std::fs::write(&path, r#"{"users": [], "default_user_for_display": ""}"#).unwrap();

    let store = CredentialStore::load(&path);
    assert_eq!(store.usernames(), vec!["User".to_string()]);
    assert_eq!(store.default_display_user(), "User");
}

#[test]
fn test_add_user_rejects_duplicates() {
    let (store, _temp) = create_test_store();

    store.add_user("alice", "secret").unwrap();
    let err = store.add_user("alice", "other").unwrap_err();
    assert!(matches!(err, CredentialError::UserExists(name) if name == "alice"));
    assert!(store.verify("alice", "secret"));
}

#[test]
fn test_add_user_rejects_empty_name() {
    let (store, _temp) = create_test_store();
    assert!(matches!(
        store.add_user("  ", "pw"),
        Err(CredentialError::EmptyUsername)
    ));
}

#[test]
fn test_delete_last_user_is_rejected() {
    let (store, _temp) = create_test_store();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let err = store.delete_user("User").unwrap_err();
    assert!(matches!(err, CredentialError::LastUser));
    assert_eq!(err.to_string(), "Cannot delete the last user");
    assert_eq!(store.usernames(), vec!["User".to_string()]);
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn test_delete_unknown_user() {
    let (store, _temp) = create_test_store();
    store.add_user("alice", "pw").unwrap();

    assert!(matches!(
        store.delete_user("bob"),
        Err(CredentialError::UserNotFound(_))
    ));
    assert_eq!(store.usernames().len(), 2);
}

#[test]
fn test_deleting_default_user_reassigns_default() {
    let (store, _temp) = create_test_store();
    store.add_user("alice", "pw").unwrap();
    store.add_user("bob", "pw").unwrap();
    assert_eq!(store.default_display_user(), "User");

    store.delete_user("User").unwrap();

    let default = store.default_display_user();
    assert_eq!(default, "alice");
    assert!(store.usernames().contains(&default));
}

#[test]
fn test_change_password() {
    let (store, _temp) = create_test_store();

    assert!(!store.change_password("User", "wrong", "5678"));
    assert!(!store.change_password("ghost", "1234", "5678"));
    assert!(store.verify("User", "1234"));

    assert!(store.change_password("User", "1234", "5678"));
    assert!(store.verify("User", "5678"));
    assert!(!store.verify("User", "1234"));

    let reopened = CredentialStore::load(store.path());
    assert!(reopened.verify("User", "5678"));
}

#[test]
fn test_set_default_display_user() {
    let (store, _temp) = create_test_store();
    store.add_user("alice", "pw").unwrap();

    store.set_default_display_user("alice").unwrap();
    assert_eq!(store.default_display_user(), "alice");
    assert!(store.set_default_display_user("ghost").is_err());
    assert_eq!(store.default_display_user(), "alice");
}

#[test]
fn test_missing_default_user_falls_back_to_first() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("userconfig.json");
    let doc = serde_json::json!({
        "users": [
            {"username": "alice", "password_hash": hash_password("a")},
            {"username": "bob", "password_hash": hash_password("b")}
        ],
        "default_user_for_display": "carol"
    });
    std::fs::write(&path, doc.to_string()).unwrap();

    let store = CredentialStore::load(&path);
    assert_eq!(store.default_display_user(), "alice");
}

#[test]
fn test_other_keys_are_preserved() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("userconfig.json");
    let doc = serde_json::json!({
        "users": [{"username": "User", "password_hash": hash_password("1234")}],
        "default_user_for_display": "User",
        "run_as_admin": true,
        "theme": "dark",
        "widgets": {"weather": {"enabled": true}}
    });
    std::fs::write(&path, doc.to_string()).unwrap();

    let store = CredentialStore::load(&path);
    store.add_user("alice", "pw").unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["run_as_admin"], true);
    assert_eq!(written["theme"], "dark");
    assert_eq!(written["widgets"]["weather"]["enabled"], true);
    assert_eq!(written["users"].as_array().unwrap().len(), 2);
}

#[test]
fn test_picks_up_external_edits() {
    let (store, _temp) = create_test_store();

    let other = CredentialStore::load(store.path());
    other.add_user("alice", "pw").unwrap();

    assert!(store.verify("alice", "pw"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_added_user_verifies(
        username in "[a-zA-Z][a-zA-Z0-9_]{0,15}",
        password in ".{0,24}",
        wrong in ".{0,24}",
    ) {
        prop_assume!(username != DEFAULT_USERNAME);
        prop_assume!(password != wrong);

        let (store, _temp) = create_test_store();
        store.add_user(&username, &password).unwrap();

        prop_assert!(store.verify(&username, &password));
        prop_assert!(!store.verify(&username, &wrong));
    }
}
