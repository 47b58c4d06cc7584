//! Credential Store Module
//!
//! Per-user password digests kept in the shared settings file:
//! - `users`: list of `{username, password_hash}` records
//! - `default_user_for_display`: the user challenged on unlock
//!
//! Every other key of the document is carried through untouched.

mod store;

#[cfg(test)]
mod tests;

pub use store::{
    hash_password, CredentialStore, StoredDocument, UserRecord, DEFAULT_PASSWORD,
    DEFAULT_USERNAME,
};
