//! Error types for Stratagem.

use thiserror::Error;

/// Main error type for Stratagem operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StratagemError {
    /// A catalog, goal or configuration failed validation at load time.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// A state snapshot or encoded vector could not be decoded.
    #[error("Malformed state: {message}")]
    MalformedState { message: String },

    /// An action was requested in a state that does not satisfy its preconditions.
    #[error("Preconditions of action '{action_id}' are not satisfied: {message}")]
    Precondition { action_id: String, message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StratagemError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        StratagemError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a malformed state error.
    pub fn malformed(message: impl Into<String>) -> Self {
        StratagemError::MalformedState {
            message: message.into(),
        }
    }

    /// Returns true if the failure came from caller-supplied input rather than the engine.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StratagemError::Validation { .. }
                | StratagemError::MalformedState { .. }
                | StratagemError::Precondition { .. }
                | StratagemError::Serialization(_)
        )
    }
}

/// Convenience Result type for Stratagem operations.
pub type Result<T> = std::result::Result<T, StratagemError>;

impl From<serde_json::Error> for StratagemError {
    fn from(err: serde_json::Error) -> Self {
        StratagemError::Serialization(err.to_string())
    }
}
