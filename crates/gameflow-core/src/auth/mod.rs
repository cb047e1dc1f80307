//! Authentication session lifecycle.
//!
//! `SessionManager` owns the in-memory session state and decides when a
//! stored token is usable, drives refresh, and persists credentials through
//! the `CredentialStore`. Tokens count as expired five minutes before their
//! stated expiry.

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::{AuthOutcome, SessionManager, SessionState};
