//! Request payloads for the sign-in endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Email/password sign-in.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// New account registration.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RegisterProfile {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterProfile")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// External identity providers accepted by the social sign-in endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Apple,
    Facebook,
    Discord,
}

impl SocialProvider {
    pub const ALL: [SocialProvider; 4] = [
        SocialProvider::Google,
        SocialProvider::Apple,
        SocialProvider::Facebook,
        SocialProvider::Discord,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::Apple => "apple",
            SocialProvider::Facebook => "facebook",
            SocialProvider::Discord => "discord",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SocialProvider::Google => "Google",
            SocialProvider::Apple => "Apple",
            SocialProvider::Facebook => "Facebook",
            SocialProvider::Discord => "Discord",
        }
    }

    /// Case-insensitive lookup by provider id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Provider identity plus the opaque token the provider issued.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SocialAuth {
    #[serde(rename = "type")]
    pub provider: SocialProvider,
    pub token: String,
}

impl fmt::Debug for SocialAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocialAuth")
            .field("provider", &self.provider)
            .field("token", &"<redacted>")
            .finish()
    }
}
