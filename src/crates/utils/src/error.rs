//! Error types for utility functions.

use thiserror::Error;

/// Result type for utility operations.
pub type Result<T> = std::result::Result<T, UtilsError>;

/// Errors that can occur in utility operations.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// Transport failure: the request never produced a response.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    ///
    /// `message` is already normalized into one human-readable line.
    #[error("{message}")]
    StatusError { status: u16, message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl UtilsError {
    /// HTTP status code, if the service produced a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            UtilsError::StatusError { status, .. } => Some(*status),
            UtilsError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for UtilsError {
    fn from(err: serde_json::Error) -> Self {
        UtilsError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for UtilsError {
    fn from(err: toml::de::Error) -> Self {
        UtilsError::ConfigError(err.to_string())
    }
}
