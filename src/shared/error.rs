//! Shared Error Types
//!
//! Error types used across the local store, the state facade and the CLI.
//! Failures talking to the remote workspace service have their own type,
//! [`crate::remote::DataAccessError`], because the sync layer never lets
//! them escape to callers.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - Schema validation failures (one per field)
//! - `StorageError` - Local database or key-value store failures
//! - `NotFound` - A referenced entity does not exist
//! - `ReadOnly` - A mutation was attempted on a view-only workspace
//! - `NoWorkspace` - A workspace operation ran with no workspace bound
//! - `RemoteError` - An explicit workspace operation failed remotely
//!
//! # Usage
//!
//! ```rust
//! use pricecraft::shared::error::CraftError;
//!
//! let error = CraftError::validation("materials > 0 > name", "Material name is required");
//! ```
use thiserror::Error;

/// Errors surfaced by the crafting store
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CraftError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// Path of the field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Local storage error
    #[error("Storage error: {message}")]
    StorageError {
        /// Human-readable error message
        message: String,
    },

    /// Referenced entity missing
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("material", "project", ...)
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// The bound workspace is view-only
    #[error("Workspace is view-only; a passphrase is required to edit")]
    ReadOnly,

    #[error("No workspace is bound to this device")]
    NoWorkspace,

    /// Workspace service failure on a user-initiated operation
    #[error("Remote error: {message}")]
    RemoteError {
        /// Human-readable error message
        message: String,
    },
}

impl CraftError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteError {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for CraftError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for CraftError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<sqlx::Error> for CraftError {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(format!("Database error: {}", err))
    }
}

/// Result alias for fallible store operations
pub type Result<T> = std::result::Result<T, CraftError>;
