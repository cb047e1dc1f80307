//! Core library for gameflow: the account session lifecycle behind the
//! realm-selection front ends.
//!
//! - [`auth`]: `SessionManager`, the session state machine
//! - [`api`]: `AuthGateway` and its HTTP implementation `ApiClient`
//! - [`store`]: `CredentialStore` over pluggable key-value media
//! - [`models`]: tokens, users, realms
//! - [`config`]: on-disk configuration and medium selection
//! - [`validation`]: form input checks

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;
pub mod validation;

pub use api::{ApiClient, ApiError, AuthGateway};
pub use auth::{AuthOutcome, SessionError, SessionManager, SessionState};
pub use config::{Config, StorageBackend};
pub use store::{CredentialStore, KeyValueMedium, StorageError};
