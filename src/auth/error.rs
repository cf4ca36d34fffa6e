// Authentication Error Types
// Error handling for the identity backend, OAuth flow, and session cookies

use thiserror::Error;

use crate::security::EncryptionError;

#[derive(Debug, Error)]
pub enum AuthError {
    // Identity backend errors
    /// Rejection reported by the identity backend, shown to the user verbatim
    #[error("{0}")]
    Remote(String),

    #[error("Identity backend returned an invalid response: {0}")]
    InvalidResponse(String),

    // OAuth2-related errors
    #[error("Unsupported OAuth2 provider: {0}")]
    UnsupportedProvider(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    // Encryption errors
    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    // Network/HTTP errors
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Identity backend communication timeout")]
    Timeout,
}

// Conversion from reqwest errors
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::HttpError(err.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::JsonError(err.to_string())
    }
}

// HTTP status code mapping for error responses
impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::ConfigError(_)
            | AuthError::MissingConfig(_)
            | AuthError::InvalidConfig { .. }
            | AuthError::Encryption(_) => 500,

            AuthError::InvalidResponse(_) | AuthError::HttpError(_) => 502,

            AuthError::Timeout => 504,

            _ => 400,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Timeout | AuthError::HttpError(_))
    }

    /// Configuration faults are fatal and never degraded silently
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AuthError::ConfigError(_) | AuthError::MissingConfig(_) | AuthError::InvalidConfig { .. }
        )
    }
}
