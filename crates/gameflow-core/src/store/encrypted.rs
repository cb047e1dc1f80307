//! File medium that seals every value with XChaCha20-Poly1305.
//!
//! On-disk format per key: `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
//!
//! The 256-bit key either lives in the OS keychain (generated on first use)
//! or is derived with Argon2 from a passphrase and a random salt kept next to
//! the sealed files. The passphrase route exists for machines without a
//! usable keychain.

use std::path::PathBuf;

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use tracing::{debug, info};

use super::keychain::KeyringMedium;
use super::medium::FileMedium;
use super::{KeyValueMedium, StorageError};

const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;
const SALT_SIZE: usize = 16;

/// Keychain entry holding the generated store key.
const KEYCHAIN_KEY_NAME: &str = "store_key";

/// Sibling file holding the Argon2 salt.
const SALT_KEY_NAME: &str = "store_salt";

/// Where the encryption key comes from.
pub enum KeySource {
    Keychain(KeyringMedium),
    Passphrase(String),
}

pub struct EncryptedFileMedium {
    files: FileMedium,
    cipher: XChaCha20Poly1305,
}

impl EncryptedFileMedium {
    pub fn open(dir: PathBuf, source: KeySource) -> Result<Self, StorageError> {
        let files = FileMedium::with_extension(dir, "bin")?;
        let key = match source {
            KeySource::Keychain(keyring) => keychain_key(&keyring)?,
            KeySource::Passphrase(passphrase) => passphrase_key(&passphrase, &files)?,
        };
        Ok(Self {
            files,
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, StorageError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Crypto("decryption failed (wrong key or tampered data)".to_string()))
    }
}

impl KeyValueMedium for EncryptedFileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let Some(sealed) = self.files.read_bytes(key)? else {
            return Ok(None);
        };
        let plaintext = self.unseal(&sealed)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| StorageError::Crypto(format!("{} is not valid UTF-8", key)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let sealed = self.seal(value.as_bytes())?;
        self.files.write_bytes(key, &sealed)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.files.remove(key)
    }
}

fn keychain_key(keyring: &KeyringMedium) -> Result<[u8; KEY_SIZE], StorageError> {
    if let Some(secret) = keyring.read_secret(KEYCHAIN_KEY_NAME)? {
        return secret
            .try_into()
            .map_err(|_| StorageError::Crypto("stored key has wrong length".to_string()));
    }

    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    keyring.write_secret(KEYCHAIN_KEY_NAME, &key)?;
    info!("Generated new store encryption key");
    Ok(key)
}

fn passphrase_key(passphrase: &str, files: &FileMedium) -> Result<[u8; KEY_SIZE], StorageError> {
    let salt = match files.read_bytes(SALT_KEY_NAME)? {
        Some(salt) if salt.len() == SALT_SIZE => salt,
        Some(_) => return Err(StorageError::Crypto("salt file is corrupt".to_string())),
        None => {
            let mut salt = vec![0u8; SALT_SIZE];
            rand::thread_rng().fill_bytes(&mut salt);
            files.write_bytes(SALT_KEY_NAME, &salt)?;
            debug!("Generated new store salt");
            salt
        }
    };

    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
        .map_err(|e| StorageError::Crypto(e.to_string()))?;
    Ok(key)
}
