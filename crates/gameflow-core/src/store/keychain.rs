use keyring::Entry;

use super::{KeyValueMedium, StorageError};

/// Keychain service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "gameflow";

/// Stores each key as its own entry in the OS keychain.
pub struct KeyringMedium {
    service: String,
}

impl KeyringMedium {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }

    /// Raw secret bytes, used for the file encryption key.
    pub(crate) fn read_secret(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.entry(key)?.get_secret() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn write_secret(&self, key: &str, secret: &[u8]) -> Result<(), StorageError> {
        self.entry(key)?.set_secret(secret)?;
        Ok(())
    }
}

impl Default for KeyringMedium {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl KeyValueMedium for KeyringMedium {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
