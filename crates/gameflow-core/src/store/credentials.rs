use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{AuthToken, User};

use super::{KeyValueMedium, StorageError};

/// Opaque application settings blob.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// The record kinds the store knows about, each under a fixed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Token,
    User,
    Settings,
    LastRealm,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Token,
        RecordKind::User,
        RecordKind::Settings,
        RecordKind::LastRealm,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RecordKind::Token => "auth_token",
            RecordKind::User => "user_data",
            RecordKind::Settings => "settings",
            RecordKind::LastRealm => "last_realm",
        }
    }
}

/// Structured persistence for the token, user, settings and last realm.
///
/// Reads never fail: a read error or an unparseable value is logged and
/// reported as absent, so session restoration always reaches a definite
/// state. Writes and clears surface their errors to the caller.
pub struct CredentialStore<M> {
    medium: M,
}

impl<M: KeyValueMedium> CredentialStore<M> {
    pub fn new(medium: M) -> Self {
        Self { medium }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn save<T: Serialize + ?Sized>(&self, kind: RecordKind, value: &T) -> Result<(), StorageError> {
        let key = kind.key();
        let contents = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.medium.write(key, &contents)?;
        debug!(key, "Saved record");
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, kind: RecordKind) -> Option<T> {
        let key = kind.key();
        let contents = match self.medium.read(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read record, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Corrupt record, treating as absent");
                None
            }
        }
    }

    /// Idempotent: clearing an absent record succeeds.
    pub fn clear(&self, kind: RecordKind) -> Result<(), StorageError> {
        self.medium.remove(kind.key())
    }

    /// Remove the token and user. Both removals are attempted even if the
    /// first fails; the first error is returned.
    pub fn clear_credentials(&self) -> Result<(), StorageError> {
        self.clear_each(&[RecordKind::Token, RecordKind::User])
    }

    /// Remove every known record.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.clear_each(&RecordKind::ALL)
    }

    fn clear_each(&self, kinds: &[RecordKind]) -> Result<(), StorageError> {
        let mut first_error = None;
        for kind in kinds {
            if let Err(e) = self.clear(*kind) {
                warn!(key = kind.key(), error = %e, "Failed to clear record");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ===== Token =====

    pub fn token(&self) -> Option<AuthToken> {
        self.get(RecordKind::Token)
    }

    pub fn save_token(&self, token: &AuthToken) -> Result<(), StorageError> {
        self.save(RecordKind::Token, token)
    }

    // ===== User =====

    pub fn user(&self) -> Option<User> {
        self.get(RecordKind::User)
    }

    pub fn save_user(&self, user: &User) -> Result<(), StorageError> {
        self.save(RecordKind::User, user)
    }

    // ===== Settings =====

    pub fn settings(&self) -> Option<Settings> {
        self.get(RecordKind::Settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.save(RecordKind::Settings, settings)
    }

    // ===== Last selected realm =====

    pub fn last_realm(&self) -> Option<String> {
        self.get(RecordKind::LastRealm)
    }

    pub fn save_last_realm(&self, realm_id: &str) -> Result<(), StorageError> {
        self.save(RecordKind::LastRealm, realm_id)
    }
}
