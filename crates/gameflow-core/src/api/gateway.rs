//! The request/response contract the session manager depends on.
//!
//! `ApiClient` implements it over HTTP; tests substitute scripted doubles.
//! Every call resolves to a `Result`, never panics past its boundary, and
//! reports transport failures as network-category `ApiError`s. Whether a
//! token is stale is not the gateway's concern.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{AuthToken, Credentials, RegisterProfile, SocialAuth, User};

use super::ApiError;

/// Response to a successful login, registration or social login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: AuthToken,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPayload {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub token: AuthToken,
    #[serde(default)]
    pub user: Option<User>,
}

pub trait AuthGateway: Send + Sync {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    fn register(
        &self,
        profile: &RegisterProfile,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    fn social_login(
        &self,
        provider: &SocialAuth,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    /// Ask the server whether `access_token` is still accepted.
    fn verify(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<VerifyPayload, ApiError>> + Send;

    /// Trade a refresh token for a new token pair.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RefreshPayload, ApiError>> + Send;

    /// Invalidate `access_token` server-side.
    fn logout(&self, access_token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<G: AuthGateway> AuthGateway for Arc<G> {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send {
        (**self).login(credentials)
    }

    fn register(
        &self,
        profile: &RegisterProfile,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send {
        (**self).register(profile)
    }

    fn social_login(
        &self,
        provider: &SocialAuth,
    ) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send {
        (**self).social_login(provider)
    }

    fn verify(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<VerifyPayload, ApiError>> + Send {
        (**self).verify(access_token)
    }

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RefreshPayload, ApiError>> + Send {
        (**self).refresh(refresh_token)
    }

    fn logout(&self, access_token: &str) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).logout(access_token)
    }
}
