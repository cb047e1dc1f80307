//! Credential persistence.
//!
//! `CredentialStore` maps the four record kinds onto fixed keys of a
//! `KeyValueMedium`. Media:
//! - `MemoryMedium`: in-process, for tests and ephemeral runs
//! - `FileMedium`: one JSON file per key in the data directory
//! - `KeyringMedium`: one OS keychain entry per key
//! - `EncryptedFileMedium`: sealed files, key from keychain or passphrase

pub mod credentials;
pub mod encrypted;
pub mod error;
pub mod keychain;
pub mod medium;

pub use credentials::{CredentialStore, RecordKind, Settings};
pub use encrypted::{EncryptedFileMedium, KeySource};
pub use error::StorageError;
pub use keychain::KeyringMedium;
pub use medium::{FileMedium, KeyValueMedium, MemoryMedium};
