//! # Network Monitor
//!
//! Reachability of the workspace service, checked on demand before each
//! network operation. There is no background polling.

use std::sync::{Arc, Mutex, PoisonError};

use crate::remote::DataAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Not checked yet
    Unknown,
    Online,
    Offline,
}

pub struct NetworkMonitor {
    remote: Arc<dyn DataAccess>,
    current_status: Mutex<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(remote: Arc<dyn DataAccess>) -> Self {
        Self {
            remote,
            current_status: Mutex::new(NetworkStatus::Unknown),
        }
    }

    /// Ask the service whether it is reachable and remember the answer
    pub async fn check(&self) -> bool {
        let reachable = self.remote.is_reachable().await;
        let status = if reachable {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        };

        let mut current = self
            .current_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != status {
            tracing::info!("Workspace service is now {:?}", status);
            *current = status;
        }
        reachable
    }

    /// Result of the most recent check
    pub fn status(&self) -> NetworkStatus {
        *self
            .current_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
