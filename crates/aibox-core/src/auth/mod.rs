//! Local user store: username → password digest, kept in one JSON file.
//!
//! Digests are unsalted SHA-256 so that existing `users.json` files keep
//! working. This is intentionally weak: anyone holding the file can run a
//! dictionary attack against it.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AiboxError, AuthError};

type UserMap = BTreeMap<String, String>;

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex-encoded SHA-256 of the raw password bytes.
    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        validate_username(username)?;

        let mut users = self.load_users();
        if users.contains_key(username) {
            return Err(AuthError::DuplicateUser);
        }
        users.insert(username.to_string(), Self::hash_password(password));
        self.persist(&users)?;

        tracing::info!(user = username, "registered user");
        Ok(())
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let users = self.load_users();
        let stored = users.get(username).ok_or(AuthError::UnknownUser)?;
        if *stored != Self::hash_password(password) {
            return Err(AuthError::WrongPassword);
        }
        Ok(())
    }

    pub fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.verify(username, old_password)?;

        let mut users = self.load_users();
        users.insert(username.to_string(), Self::hash_password(new_password));
        self.persist(&users)?;

        tracing::info!(user = username, "password changed");
        Ok(())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.load_users().contains_key(username)
    }

    /// All registered usernames, sorted.
    pub fn usernames(&self) -> Vec<String> {
        self.load_users().into_keys().collect()
    }

    /// Load the whole store. Missing or corrupt files read as empty.
    fn load_users(&self) -> UserMap {
        if !self.path.exists() {
            return UserMap::new();
        }
        let parsed = fs::read_to_string(&self.path)
            .map_err(AiboxError::from)
            .and_then(|contents| serde_json::from_str(&contents).map_err(AiboxError::from));
        match parsed {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!("failed to load user store {}: {e}", self.path.display());
                UserMap::new()
            }
        }
    }

    fn persist(&self, users: &UserMap) -> Result<(), AuthError> {
        self.save_users(users).map_err(|e| {
            tracing::warn!("failed to save user store {}: {e}", self.path.display());
            AuthError::Storage(e.to_string())
        })
    }

    fn save_users(&self, users: &UserMap) -> Result<(), AiboxError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(users)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// The username doubles as a directory name for its history, so it has to be
/// a single plain path component.
fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::EmptyCredentials);
    }
    if username == "." || username == ".." {
        return Err(AuthError::InvalidUsername(username.to_string()));
    }
    if username.contains(['/', '\\', '\0']) {
        return Err(AuthError::InvalidUsername(username.to_string()));
    }
    Ok(())
}
