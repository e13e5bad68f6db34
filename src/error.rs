//! Error types for Easel

use crate::auth::IdentityError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by Easel operations
#[derive(Error, Debug)]
pub enum EaselError {
    /// The backend call failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input rejected before any remote call was made
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The operation needs a signed-in identity
    #[error("Not signed in")]
    NotSignedIn,

    /// Access gate denied the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Failed to serialize/deserialize a row
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed identity
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Unknown role name
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The component was torn down
    #[error("Shut down")]
    Shutdown,
}

impl EaselError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EaselError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for Easel operations
pub type Result<T> = std::result::Result<T, EaselError>;
