use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not signed in")]
    NotAuthenticated,

    /// The server refused to refresh; the session has been ended.
    #[error("Session expired - please sign in again")]
    Expired(#[source] ApiError),

    /// Recoverable failure; the session and stored credentials are untouched.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
