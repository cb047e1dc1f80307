use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code reported for every transport-level failure.
pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";

const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";
const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Structured error returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default = "default_code")]
    pub code: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn default_code() -> String {
    UNKNOWN_ERROR_CODE.to_string()
}

fn default_message() -> String {
    UNKNOWN_ERROR_MESSAGE.to_string()
}

impl Default for ErrorBody {
    fn default() -> Self {
        Self {
            code: default_code(),
            message: default_message(),
            details: None,
        }
    }
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    /// The server answered and refused the request.
    #[error("{}", .0.message)]
    Rejected(ErrorBody),

    /// The server failed on its side (5xx) and explained why.
    #[error("Server error: {}", .0.message)]
    ServerError(ErrorBody),
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a failed response whose body is not a structured error.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Rejected(ErrorBody::new(
                "UNAUTHORIZED",
                "Unauthorized - token may be expired",
            )),
            403 => ApiError::Rejected(ErrorBody::new("FORBIDDEN", format!("Access denied: {}", truncated))),
            429 => ApiError::RateLimited,
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::Rejected(body) | ApiError::ServerError(body) => &body.code,
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::Timeout | ApiError::Network(_) | ApiError::InvalidResponse(_) => NETWORK_ERROR_CODE,
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::Rejected(body) | ApiError::ServerError(body) => body.details.as_ref(),
            _ => None,
        }
    }

    /// Recoverable failures that say nothing about the credential itself.
    pub fn is_network(&self) -> bool {
        !self.is_rejection()
    }

    /// The server looked at the request and said no.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected(_))
    }

    /// Message suitable for showing to the user. Server messages pass
    /// through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected(body) | ApiError::ServerError(body) => body.message.clone(),
            ApiError::Timeout => "Connection timed out. Please try again.".to_string(),
            ApiError::Network(_) => "Unable to connect to server. Check your internet connection.".to_string(),
            ApiError::InvalidResponse(_) => "The server sent an unexpected response. Please try again.".to_string(),
            ApiError::RateLimited => "Too many requests. Please wait a moment and try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
