//! Credential Storage Implementation
//!
//! Provides JSON file-based credential storage with:
//! - Atomic writes using temp file + rename, confirmed by a read-back
//! - Thread-safe access via RwLock
//! - Default store generation on first run
//!
//! Concurrent writers from several processes are not supported; each
//! mutation reloads the file, applies the change and rewrites it whole.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;

use crate::core::config::find_user_config_path;
use crate::core::error::{ConfigError, CredentialError};

/// User created when no settings file exists
pub const DEFAULT_USERNAME: &str = "User";

/// Password of the default user
pub const DEFAULT_PASSWORD: &str = "1234";

/// Hex SHA-256 digest of a password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// One user entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password_hash: hash_password(password),
        }
    }
}

/// The settings document as seen by the credential store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default)]
    pub users: Vec<UserRecord>,

    #[serde(default)]
    pub default_user_for_display: String,

    /// Keys owned by other components
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl StoredDocument {
    /// Document holding only the default user
    pub fn with_default_user() -> Self {
        Self {
            users: vec![UserRecord::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)],
            default_user_for_display: DEFAULT_USERNAME.to_string(),
            other: serde_json::Map::new(),
        }
    }

    fn find(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username == username)
    }

    fn contains(&self, username: &str) -> bool {
        self.find(username).is_some()
    }

    /// Point `default_user_for_display` at an existing record
    fn repair_default_user(&mut self) {
        if !self.contains(&self.default_user_for_display) {
            self.default_user_for_display = self
                .users
                .first()
                .map(|u| u.username.clone())
                .unwrap_or_default();
        }
    }
}

/// Credential store backed by `userconfig.json`
pub struct CredentialStore {
    path: PathBuf,
    document: RwLock<StoredDocument>,
}

impl CredentialStore {
    /// Open the store at the discovered settings path
    pub fn load_default() -> Self {
        Self::load(&find_user_config_path())
    }

    /// Open the store at `path`.
    ///
    /// A missing file is created with the default user. An unreadable or
    /// corrupt file yields the default user in memory and is left alone.
    pub fn load(path: &Path) -> Self {
        let document = if path.exists() {
            match read_document(path) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::error!(
                        "Error reading credential store {:?}: {}. Using default credentials.",
                        path,
                        e
                    );
                    StoredDocument::with_default_user()
                }
            }
        } else {
            tracing::info!("No settings file at {:?}, creating default user", path);
            let doc = StoredDocument::with_default_user();
            if let Err(e) = persist(path, &doc) {
                tracing::error!("Failed to create default credential store: {}", e);
            }
            doc
        };

        Self {
            path: path.to_path_buf(),
            document: RwLock::new(normalize(document)),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a password against the named user.
    ///
    /// Unknown users and wrong passwords are indistinguishable to the caller:
    /// the attempt is always hashed and compared in constant time.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.reload();
        let attempt = hash_password(password);
        let doc = self.document.read();

        let (stored, known) = match doc.find(username) {
            Some(record) => (record.password_hash.as_str(), true),
            None => (attempt.as_str(), false),
        };
        let matches: bool = attempt.as_bytes().ct_eq(stored.as_bytes()).into();
        let ok = matches && known;

        if !ok {
            tracing::debug!("Password verification failed");
        }
        ok
    }

    /// Replace a user's password after checking the old one
    pub fn change_password(&self, username: &str, old_password: &str, new_password: &str) -> bool {
        if !self.verify(username, old_password) {
            return false;
        }

        let result = self.mutate(|doc| {
            let record = doc
                .users
                .iter_mut()
                .find(|u| u.username == username)
                .ok_or_else(|| CredentialError::UserNotFound(username.to_string()))?;
            record.password_hash = hash_password(new_password);
            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::info!("Password changed for user '{}'", username);
                true
            }
            Err(e) => {
                tracing::warn!("Password change for '{}' failed: {}", username, e);
                false
            }
        }
    }

    /// Append a new user
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        if username.trim().is_empty() {
            return Err(CredentialError::EmptyUsername);
        }

        self.mutate(|doc| {
            if doc.contains(username) {
                return Err(CredentialError::UserExists(username.to_string()));
            }
            doc.users.push(UserRecord::new(username, password));
            if doc.users.len() == 1 && doc.default_user_for_display.is_empty() {
                doc.default_user_for_display = username.to_string();
            }
            Ok(())
        })?;

        tracing::info!("User '{}' added", username);
        Ok(())
    }

    /// Remove a user; the last remaining user cannot be removed
    pub fn delete_user(&self, username: &str) -> Result<(), CredentialError> {
        self.mutate(|doc| {
            if doc.users.len() <= 1 {
                return Err(CredentialError::LastUser);
            }
            if !doc.contains(username) {
                return Err(CredentialError::UserNotFound(username.to_string()));
            }
            doc.users.retain(|u| u.username != username);
            if doc.default_user_for_display == username {
                doc.default_user_for_display = doc.users[0].username.clone();
            }
            Ok(())
        })?;

        tracing::info!("User '{}' deleted", username);
        Ok(())
    }

    /// User challenged by the unlock prompt
    pub fn default_display_user(&self) -> String {
        self.reload();
        self.document.read().default_user_for_display.clone()
    }

    /// Change the user challenged by the unlock prompt
    pub fn set_default_display_user(&self, username: &str) -> Result<(), CredentialError> {
        self.mutate(|doc| {
            if !doc.contains(username) {
                return Err(CredentialError::UserNotFound(username.to_string()));
            }
            doc.default_user_for_display = username.to_string();
            Ok(())
        })
    }

    /// All usernames in file order
    pub fn usernames(&self) -> Vec<String> {
        self.reload();
        self.document
            .read()
            .users
            .iter()
            .map(|u| u.username.clone())
            .collect()
    }

    /// Snapshot of the in-memory document
    pub fn snapshot(&self) -> StoredDocument {
        self.document.read().clone()
    }

    /// Pick up edits made by other components since the last read
    fn reload(&self) {
        if !self.path.exists() {
            return;
        }
        match read_document(&self.path) {
            Ok(doc) => *self.document.write() = normalize(doc),
            Err(e) => tracing::warn!("Keeping cached credentials, reload failed: {}", e),
        }
    }

    /// Reload, apply `change`, persist. The cache is only updated on success.
    fn mutate<F>(&self, change: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut StoredDocument) -> Result<(), CredentialError>,
    {
        self.reload();
        let mut guard = self.document.write();
        let mut doc = guard.clone();
        change(&mut doc)?;

        persist(&self.path, &doc).map_err(|e| CredentialError::SaveFailed(e.to_string()))?;
        *guard = doc;
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<StoredDocument, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// An empty user table is never exposed; the default user fills it in memory
fn normalize(mut doc: StoredDocument) -> StoredDocument {
    if doc.users.is_empty() {
        tracing::warn!("Credential store has no users, using default user");
        doc.users.push(UserRecord::new(DEFAULT_USERNAME, DEFAULT_PASSWORD));
    }
    doc.repair_default_user();
    doc
}

/// Write the full document atomically, then read it back.
///
/// A failed read-back is logged, not returned.
fn persist(path: &Path, doc: &StoredDocument) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(doc)?;
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &content)?;
    std::fs::rename(&temp_path, path)?;

    match read_document(path) {
        Ok(written) if written.users == doc.users => {
            tracing::debug!("Credential store saved to {:?}", path);
        }
        Ok(_) => tracing::error!(
            "{}",
            CredentialError::ReadBackMismatch(path.to_path_buf())
        ),
        Err(e) => tracing::error!("Credential store read-back failed for {:?}: {}", path, e),
    }
    Ok(())
}
