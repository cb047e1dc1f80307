//! Data models shared by the gateway, the credential store and the session.
//!
//! - `AuthToken`: access/refresh token pair with expiry rules
//! - `User`, `UserUpdate`: the authenticated account and profile edits
//! - `Credentials`, `RegisterProfile`, `SocialAuth`: sign-in payloads
//! - `Realm`, `Character`: realm selection data

pub mod auth;
pub mod realm;
pub mod token;
pub mod user;

pub use auth::{Credentials, RegisterProfile, SocialAuth, SocialProvider};
pub use realm::{Character, Realm, RealmCharactersResponse, RealmStatus};
pub use token::{expiry_buffer, is_token_expired, AuthToken, EXPIRY_BUFFER_MINUTES};
pub use user::{User, UserUpdate};
