//! Error handling for the adoption client

use std::fmt;
use thiserror::Error;

/// PostgreSQL error code for a unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// Unified error type for the adoption client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Error body returned by the backend
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Realtime subscription errors
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Edge Function errors
    #[error("Function error: {0}")]
    Function(String),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend is not configured
    #[error("backend is not configured")]
    NotConfigured,

    /// An operation that needs a signed-in user ran without one
    #[error("no authenticated user")]
    NotAuthenticated,

    /// A row could not be found
    #[error("{0} not found")]
    NotFound(String),

    /// An action the orchestrator's current state does not allow
    #[error(transparent)]
    Transition(#[from] crate::app::TransitionError),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new realtime error
    pub fn realtime<T: fmt::Display>(msg: T) -> Self {
        Error::Realtime(msg.to_string())
    }

    /// Create a new function error
    pub fn function<T: fmt::Display>(msg: T) -> Self {
        Error::Function(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether the backend rejected a write because the row already exists
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Api { code: Some(code), .. } if code == UNIQUE_VIOLATION)
    }

    /// Human-readable message suitable for showing inline in a form
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } => message.clone(),
            Error::Auth(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_detected_by_code() {
        let err = Error::Api {
            status: 409,
            code: Some(UNIQUE_VIOLATION.to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        };
        assert!(err.is_unique_violation());
        assert!(!Error::NotConfigured.is_unique_violation());
    }

    #[test]
    fn user_message_prefers_backend_text() {
        let err = Error::Api {
            status: 400,
            code: None,
            message: "Invalid login credentials".to_string(),
        };
        assert_eq!(err.user_message(), "Invalid login credentials");
    }
}
