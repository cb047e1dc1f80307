//! HTTP client for the game's account service.
//!
//! This module provides the `ApiClient` struct: the reqwest-backed
//! `AuthGateway` plus the profile and realm endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    Character, Credentials, Realm, RealmCharactersResponse, RegisterProfile, SocialAuth, User,
    UserUpdate,
};

use super::error::ErrorBody;
use super::gateway::{AuthGateway, AuthPayload, RefreshPayload, VerifyPayload};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when neither the config nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "https://api.yourgame.com/v1";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

mod endpoints {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const SOCIAL: &str = "/auth/social";
    pub const VERIFY: &str = "/auth/verify";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";
    pub const PROFILE: &str = "/user/profile";
    pub const PROFILE_UPDATE: &str = "/user/update";
    pub const REALMS: &str = "/realms";
}

/// Response envelope shared by every endpoint.
///
/// Error fields are accepted both nested under `error` and at the top level.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
    error: Option<ErrorBody>,
    code: Option<String>,
    message: Option<String>,
    details: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    fn into_error(self) -> ErrorBody {
        if let Some(error) = self.error {
            return error;
        }
        let defaults = ErrorBody::default();
        ErrorBody {
            code: self.code.unwrap_or(defaults.code),
            message: self.message.unwrap_or(defaults.message),
            details: self.details,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// Decode a response body into its data payload or a structured error.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Option<T>, ApiError> {
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(ApiError::InvalidResponse(format!("Failed to parse response: {}", e)));
        }
        Err(_) => return Err(ApiError::from_status(status, body)),
    };

    if status.is_success() && envelope.success.unwrap_or(true) {
        Ok(envelope.data)
    } else if status.is_server_error() {
        Err(ApiError::ServerError(envelope.into_error()))
    } else {
        Err(ApiError::Rejected(envelope.into_error()))
    }
}

/// API client for the account service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and decode the envelope. 429 responses are retried
    /// with exponential backoff.
    async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| {
                debug!(endpoint, error = %e, "Request failed");
                ApiError::from(e)
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(endpoint, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let text = response.text().await?;
            debug!(endpoint, %status, "Response received");
            return decode_envelope(status, &text);
        }
    }

    /// Like `request`, but the response must carry a data payload.
    async fn request_data<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(method, endpoint, body, bearer)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse(format!("{} returned no data", endpoint)))
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self, access_token: &str) -> Result<User, ApiError> {
        self.request_data(Method::GET, endpoints::PROFILE, None::<&()>, Some(access_token))
            .await
    }

    pub async fn update_profile(&self, access_token: &str, update: &UserUpdate) -> Result<User, ApiError> {
        self.request_data(Method::PUT, endpoints::PROFILE_UPDATE, Some(update), Some(access_token))
            .await
    }

    // ===== Realms =====

    pub async fn fetch_realms(&self, access_token: &str) -> Result<Vec<Realm>, ApiError> {
        self.request_data(Method::GET, endpoints::REALMS, None::<&()>, Some(access_token))
            .await
    }

    pub async fn fetch_realm(&self, access_token: &str, realm_id: &str) -> Result<Realm, ApiError> {
        let endpoint = format!("{}/{}", endpoints::REALMS, realm_id);
        self.request_data(Method::GET, &endpoint, None::<&()>, Some(access_token))
            .await
    }

    pub async fn fetch_realm_characters(
        &self,
        access_token: &str,
        realm_id: &str,
    ) -> Result<Vec<Character>, ApiError> {
        let endpoint = format!("{}/{}/characters", endpoints::REALMS, realm_id);
        let response: RealmCharactersResponse = self
            .request_data(Method::GET, &endpoint, None::<&()>, Some(access_token))
            .await?;
        Ok(response.characters)
    }
}

impl AuthGateway for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError> {
        self.request_data(Method::POST, endpoints::LOGIN, Some(credentials), None)
            .await
    }

    async fn register(&self, profile: &RegisterProfile) -> Result<AuthPayload, ApiError> {
        self.request_data(Method::POST, endpoints::REGISTER, Some(profile), None)
            .await
    }

    async fn social_login(&self, provider: &SocialAuth) -> Result<AuthPayload, ApiError> {
        self.request_data(Method::POST, endpoints::SOCIAL, Some(provider), None)
            .await
    }

    async fn verify(&self, access_token: &str) -> Result<VerifyPayload, ApiError> {
        self.request_data(Method::POST, endpoints::VERIFY, None::<&()>, Some(access_token))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshPayload, ApiError> {
        let body = RefreshRequest { refresh_token };
        self.request_data(Method::POST, endpoints::REFRESH, Some(&body), None)
            .await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.request::<serde_json::Value, ()>(Method::POST, endpoints::LOGOUT, None, Some(access_token))
            .await
            .map(|_| ())
    }
}
