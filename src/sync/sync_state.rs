//! # Sync State
//!
//! The sync status machine's current value plus observation.
//!
//! Status changes are broadcast over a `tokio::sync::watch` channel, so any
//! number of observers can follow them without the manager holding callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where the sync layer currently stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No workspace bound, or the service is unreachable
    #[default]
    Offline,
    /// Local changes are waiting for the debounce to fire
    Pending,
    /// A push or pull is in flight
    Syncing,
    Synced,
    /// The last network operation failed; the next mutation re-arms
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Offline => "offline",
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holder of the current [`SyncStatus`] that observers can subscribe to
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<SyncStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncStatus::Offline);
        Self { tx }
    }

    pub fn get(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    /// Move to `status`, notifying observers only on an actual change
    pub fn set(&self, status: SyncStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!("Sync status {} -> {}", current, status);
            *current = status;
            true
        });
    }

    /// Move to `status` unless a sync is currently in flight
    pub fn set_unless_syncing(&self, status: SyncStatus) {
        self.tx.send_if_modified(|current| {
            if *current == SyncStatus::Syncing || *current == status {
                return false;
            }
            tracing::debug!("Sync status {} -> {}", current, status);
            *current = status;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }
}
