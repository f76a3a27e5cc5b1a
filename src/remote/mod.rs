//! # Remote Data Access
//!
//! Contract between the sync layer and the hosted workspace service.
//!
//! The sync layer only ever talks to a [`DataAccess`] trait object, so the
//! HTTP client ([`RestDataAccess`]) can be swapped for an in-memory fake in
//! tests, or for [`Disconnected`] when no service is configured.
//!
//! All methods return boxed futures so the trait stays object-safe.

pub mod rest;

use futures_util::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::error::CraftError;
use crate::shared::models::AppState;

pub use rest::RestDataAccess;

/// Failure talking to the workspace service
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataAccessError {
    /// Transport failure or server-side (5xx) error
    #[error("Network error: {message}")]
    Network { message: String },

    /// Wrong or missing credentials (401/403)
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The service refused the request (other 4xx)
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The response did not have the expected shape
    #[error("Unexpected response: {message}")]
    Protocol { message: String },

    #[error("Workspace service is not configured")]
    NotConfigured,
}

impl DataAccessError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Classify an HTTP error status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { message },
            404 => Self::NotFound { message },
            400..=499 => Self::Rejected { status, message },
            _ => Self::Network { message },
        }
    }
}

impl From<DataAccessError> for CraftError {
    fn from(err: DataAccessError) -> Self {
        CraftError::remote(err.to_string())
    }
}

pub type DataResult<T> = std::result::Result<T, DataAccessError>;

/// Canonical identity a share token resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLookup {
    pub id: Uuid,
    pub short_name: Option<String>,
}

/// A workspace freshly created on the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWorkspace {
    pub id: Uuid,
    pub short_name: Option<String>,
    pub share_token: Option<String>,
}

/// Operations the sync layer needs from the workspace service
pub trait DataAccess: Send + Sync {
    /// Map a share token (or raw id) to the workspace identity; `None` when
    /// the service does not know the token
    fn resolve_token<'a>(&'a self, token: &'a str)
        -> BoxFuture<'a, DataResult<Option<WorkspaceLookup>>>;

    /// Full remote state for a workspace id or share token
    fn fetch_state<'a>(&'a self, token: &'a str) -> BoxFuture<'a, DataResult<Option<AppState>>>;

    /// Replace the remote state wholesale; `false` when the service declined
    fn push_state<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: Option<&'a str>,
        state: &'a AppState,
    ) -> BoxFuture<'a, DataResult<bool>>;

    /// Issue a new share token, invalidating the old one
    fn rotate_share_token<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: Option<&'a str>,
    ) -> BoxFuture<'a, DataResult<Option<String>>>;

    fn create_workspace<'a>(&'a self, passphrase: &'a str)
        -> BoxFuture<'a, DataResult<CreatedWorkspace>>;

    fn verify_passphrase<'a>(
        &'a self,
        workspace_id: Uuid,
        passphrase: &'a str,
    ) -> BoxFuture<'a, DataResult<bool>>;

    /// Service health check
    fn is_reachable(&self) -> BoxFuture<'_, bool>;
}

/// Stand-in used when no workspace service is configured: never reachable,
/// every call fails with [`DataAccessError::NotConfigured`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl DataAccess for Disconnected {
    fn resolve_token<'a>(&'a self, _token: &'a str)
        -> BoxFuture<'a, DataResult<Option<WorkspaceLookup>>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn fetch_state<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, DataResult<Option<AppState>>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn push_state<'a>(
        &'a self,
        _workspace_id: Uuid,
        _passphrase: Option<&'a str>,
        _state: &'a AppState,
    ) -> BoxFuture<'a, DataResult<bool>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn rotate_share_token<'a>(
        &'a self,
        _workspace_id: Uuid,
        _passphrase: Option<&'a str>,
    ) -> BoxFuture<'a, DataResult<Option<String>>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn create_workspace<'a>(&'a self, _passphrase: &'a str)
        -> BoxFuture<'a, DataResult<CreatedWorkspace>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn verify_passphrase<'a>(
        &'a self,
        _workspace_id: Uuid,
        _passphrase: &'a str,
    ) -> BoxFuture<'a, DataResult<bool>> {
        Box::pin(future::ready(Err(DataAccessError::NotConfigured)))
    }

    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(future::ready(false))
    }
}
