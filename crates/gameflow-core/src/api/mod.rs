//! Remote auth gateway.
//!
//! `AuthGateway` is the contract the session manager consumes; `ApiClient`
//! implements it over HTTPS and adds the profile and realm endpoints.
//! Responses use a `{success, data?, error?}` envelope and every failure is
//! translated into an `ApiError` at this boundary.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{ApiClient, DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, ErrorBody, NETWORK_ERROR_CODE};
pub use gateway::{AuthGateway, AuthPayload, RefreshPayload, VerifyPayload};
