//! Error types for the kanban client
//!
//! [`KanbanError`] classifies every failure the client can see.
//! [`MutationError`] is what a failed create/update/delete surfaces to the
//! user, after the cache has been rolled back.

use crate::events::MutationKind;
use std::fmt;
use utils::UtilsError;

/// Result type alias for kanban operations
pub type Result<T> = std::result::Result<T, KanbanError>;

/// Message shown for transport failures, whatever the underlying cause.
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the task service. Check your connection and try again.";

/// Main error type for kanban operations
#[derive(Debug)]
pub enum KanbanError {
    /// Input rejected by the service (empty title, bad foreign key, ...)
    Validation(String),

    /// Target entity does not exist (or no longer does)
    NotFound(String),

    /// Transport failure: no response was received
    Network(String),

    /// Service answered with a 5xx status
    Server { status: u16, message: String },

    /// A background list/get fetch kept failing after its retries
    TransientRead { attempts: usize, message: String },

    /// Configuration error
    Config(String),

    /// IO error
    Io(std::io::Error),

    /// Serialization/deserialization error
    Serde(serde_json::Error),

    /// Generic error with message
    Other(String),
}

impl KanbanError {
    /// Failures worth retrying for reads. Mutations are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The text shown to the user.
    ///
    /// Service messages are passed through verbatim; transport failures
    /// get a generic message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::Server { message, .. } => message.clone(),
            Self::TransientRead { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for KanbanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Server { status, message } => write!(f, "Server error ({}): {}", status, message),
            Self::TransientRead { attempts, message } => {
                write!(f, "Read failed after {} attempt(s): {}", attempts, message)
            }
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Serde(err) => write!(f, "Serialization error: {}", err),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for KanbanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            _ => None,
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for KanbanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for KanbanError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl From<UtilsError> for KanbanError {
    fn from(err: UtilsError) -> Self {
        match err {
            UtilsError::StatusError { status, message } => match status {
                404 => Self::NotFound(message),
                400..=499 => Self::Validation(message),
                _ => Self::Server { status, message },
            },
            UtilsError::HttpError(e) => Self::Network(e.to_string()),
            UtilsError::SerializationError(msg) => {
                Self::Other(format!("Unexpected response from task service: {}", msg))
            }
            UtilsError::ConfigError(msg) => Self::Config(msg),
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for KanbanError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for KanbanError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

/// A create/update/delete that failed and was rolled back.
#[derive(Debug)]
pub struct MutationError {
    pub kind: MutationKind,
    pub source: KanbanError,
}

impl MutationError {
    pub fn new(kind: MutationKind, source: KanbanError) -> Self {
        Self { kind, source }
    }

    /// Notification text, e.g. `Failed to create task: Title is required`.
    pub fn user_message(&self) -> String {
        format!("Failed to {}: {}", self.kind, self.source.user_message())
    }
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to {}: {}", self.kind, self.source)
    }
}

impl std::error::Error for MutationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
