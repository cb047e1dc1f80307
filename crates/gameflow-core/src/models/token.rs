use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lead time subtracted from a token's stated expiry.
/// A token inside this window is treated as expired so it gets refreshed
/// before the server-side expiry can elapse mid-request.
pub const EXPIRY_BUFFER_MINUTES: i64 = 5;

pub fn expiry_buffer() -> Duration {
    Duration::minutes(EXPIRY_BUFFER_MINUTES)
}

/// Access/refresh token pair issued by the auth service.
///
/// Immutable once issued; a refresh or re-login replaces it wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp in milliseconds on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[cfg_attr(feature = "ts", ts(type = "number"))]
    pub expires_at: DateTime<Utc>,
    pub user_id: String,
}

impl AuthToken {
    /// Instant from which the token counts as expired, or `None` when the
    /// buffer would step outside the representable range.
    pub fn refresh_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at.checked_sub_signed(expiry_buffer())
    }

    /// Expiry check against an explicit clock. The boundary is inclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.refresh_at() {
            Some(refresh_at) => now >= refresh_at,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get minutes remaining until the token needs refreshing (for display)
    pub fn minutes_until_refresh(&self) -> i64 {
        self.refresh_at()
            .map(|at| (at - Utc::now()).num_minutes().max(0))
            .unwrap_or(0)
    }
}

/// An absent token is always expired.
pub fn is_token_expired(token: Option<&AuthToken>) -> bool {
    token.map(AuthToken::is_expired).unwrap_or(true)
}

// Keep credentials out of logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .finish()
    }
}
