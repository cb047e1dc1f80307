//! Key-value media the credential store can persist through.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::StorageError;

/// Durable string storage addressed by fixed keys.
///
/// Writes must be atomic per key: a reader sees either the old value or the
/// new one, never a partial write. Removing an absent key is not an error.
pub trait KeyValueMedium: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<M: KeyValueMedium + ?Sized> KeyValueMedium for Box<M> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<M: KeyValueMedium + ?Sized> KeyValueMedium for Arc<M> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-process medium. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
pub struct FileMedium {
    dir: PathBuf,
    extension: &'static str,
}

impl FileMedium {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        Self::with_extension(dir, "json")
    }

    pub(crate) fn with_extension(dir: PathBuf, extension: &'static str) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir).map_err(|e| StorageError::io("<dir>", e))?;
        Ok(Self { dir, extension })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", sanitize_key(key), self.extension))
    }

    pub(crate) fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    /// Write via a sibling temp file and rename so the key is never torn.
    pub(crate) fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key);
        let tmp = path.with_extension(format!("{}.tmp", self.extension));
        fs::write(&tmp, bytes).map_err(|e| StorageError::io(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(key, e))?;
        debug!(key, "Wrote storage file");
        Ok(())
    }
}

impl KeyValueMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.read_bytes(key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::io(key, std::io::Error::new(ErrorKind::InvalidData, e))),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_bytes(key, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }
}

/// Keys become file names; anything outside `[A-Za-z0-9_-]` maps to `_`.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
