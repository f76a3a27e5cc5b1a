//! # Sync Manager
//!
//! Offline-first synchronization between the local store and a remote
//! workspace.
//!
//! ## Architecture
//!
//! - **Sync State**: status machine with watch-based observation
//! - **Scheduler**: cancellable debounce for pushes
//! - **Network Monitor**: reachability check before each network call
//! - **Pending Changes**: advisory bookkeeping of unsynced mutations
//! - **Workspace Resolver**: URL tokens, binding precedence, share links
//!
//! ## Status machine
//!
//! ```text
//! offline -> pending -> syncing -> synced | error
//!    ^          ^                      |
//!    +----------+----------------------+  (next mutation re-arms)
//! ```
//!
//! Pushes always send the whole state; pulls are remote-wins. A second
//! push while one is in flight fails fast instead of queueing, and nothing
//! is retried automatically. Push, pull and initialize never return a
//! network error to the caller: failures settle the status to `error` (or
//! `offline`). Workspace operations (create, join, view, unlock, rotate)
//! return `Result`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pricecraft::local_db::LocalDatabase;
//! use pricecraft::remote::Disconnected;
//! use pricecraft::shared::AppConfig;
//! use pricecraft::sync::SyncManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::builder().build()?;
//! let manager = SyncManager::new(LocalDatabase::in_memory(), Arc::new(Disconnected), &config).await;
//! let outcome = manager.initialize(None).await;
//! println!("status: {}", manager.status());
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod pending;
pub mod scheduler;
pub mod sync_state;
pub mod workspace;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use reqwest::Url;
use serde_json::Value;
use tokio::sync::watch;

use crate::local_db::{LocalDatabase, SyncMeta, WorkspaceInfo};
use crate::remote::{DataAccess, DataResult};
use crate::shared::config::AppConfig;
use crate::shared::error::{CraftError, Result};
use crate::shared::models::AppState;

pub use network_monitor::{NetworkMonitor, NetworkStatus};
pub use pending::{ChangeKind, PendingChange, PendingChanges};
pub use scheduler::DebouncedTask;
pub use sync_state::{StatusTracker, SyncStatus};
pub use workspace::{shareable_url, token_from_url, JoinOutcome, WorkspaceResolver};

/// What [`SyncManager::initialize`] found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitOutcome {
    pub workspace: Option<WorkspaceInfo>,
    /// Remote state fetched during startup, if the service was reachable
    pub remote_state: Option<AppState>,
}

/// Clears the in-flight flag when a push ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Coordinates pushes, pulls and workspace binding for one device
pub struct SyncManager {
    db: LocalDatabase,
    remote: Arc<dyn DataAccess>,
    resolver: WorkspaceResolver,
    monitor: NetworkMonitor,
    status: StatusTracker,
    workspace: RwLock<Option<WorkspaceInfo>>,
    last_synced_at: Mutex<Option<i64>>,
    pending: PendingChanges,
    in_flight: AtomicBool,
    debounce: DebouncedTask,
}

impl SyncManager {
    pub async fn new(db: LocalDatabase, remote: Arc<dyn DataAccess>, config: &AppConfig) -> Arc<Self> {
        let workspace = db.workspace().load_workspace().await;
        let last_synced_at = db.workspace().load_sync_meta().await.last_synced_at;

        Arc::new(Self {
            resolver: WorkspaceResolver::new(db.clone(), Arc::clone(&remote), config.app_url.clone()),
            monitor: NetworkMonitor::new(Arc::clone(&remote)),
            status: StatusTracker::new(),
            workspace: RwLock::new(workspace),
            last_synced_at: Mutex::new(last_synced_at),
            pending: PendingChanges::new(),
            in_flight: AtomicBool::new(false),
            debounce: DebouncedTask::new(config.sync_debounce),
            db,
            remote,
        })
    }

    pub fn status(&self) -> SyncStatus {
        self.status.get()
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Epoch milliseconds of the last successful push or pull
    pub fn last_synced_at(&self) -> Option<i64> {
        *self
            .last_synced_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn workspace(&self) -> Option<WorkspaceInfo> {
        self.workspace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `true` in pure local mode or with a passphrase-bearing binding
    pub fn can_edit(&self) -> bool {
        self.workspace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, WorkspaceInfo::can_edit)
    }

    /// Whether local mutations should be pushed
    pub fn push_enabled(&self) -> bool {
        self.workspace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(WorkspaceInfo::can_edit)
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.monitor.status()
    }

    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.pending.snapshot()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Share link for the bound workspace
    pub fn shareable_url(&self) -> Option<Url> {
        self.workspace().map(|ws| self.resolver.shareable_url(&ws))
    }

    /// Replace the binding, persisting it (or clearing it for `None`)
    pub async fn set_workspace(&self, workspace: Option<WorkspaceInfo>) {
        match &workspace {
            Some(ws) => self.db.workspace().save_workspace(ws).await,
            None => self.db.workspace().clear_workspace().await,
        }
        *self
            .workspace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = workspace;
    }

    /// Record a local mutation for bookkeeping
    pub fn queue_change(&self, kind: ChangeKind, table: &str, data: Value) {
        self.pending.push(kind, table, data);
        self.status.set_unless_syncing(SyncStatus::Pending);
    }

    pub fn clear_pending_changes(&self) {
        self.pending.clear();
    }

    /// Arm the debounce to push `state` once edits go quiet
    ///
    /// Each call replaces the previously armed push, so the state pushed is
    /// always the one from the latest call.
    pub fn schedule_push(self: &Arc<Self>, state: AppState) {
        if !self.push_enabled() {
            return;
        }
        self.status.set_unless_syncing(SyncStatus::Pending);

        let manager = Arc::clone(self);
        self.debounce.schedule(async move {
            manager.sync(&state).await;
        });
    }

    /// Drop an armed, not yet fired push
    pub fn cancel_scheduled_push(&self) {
        self.debounce.cancel();
    }

    /// Push the whole `state` to the bound workspace
    ///
    /// Returns `false` without touching the network when no editable
    /// workspace is bound or another push is in flight. Changes recorded
    /// while the push is in flight stay pending, and so does the status.
    pub async fn sync(&self, state: &AppState) -> bool {
        let Some(workspace) = self.workspace().filter(WorkspaceInfo::can_edit) else {
            return false;
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync already in progress; rejecting concurrent attempt");
            return false;
        }
        let _guard = InFlightGuard(&self.in_flight);
        let watermark = self.pending.watermark();

        self.status.set(SyncStatus::Syncing);

        if !self.monitor.check().await {
            self.status.set(SyncStatus::Offline);
            return false;
        }

        match self
            .remote
            .push_state(workspace.id, workspace.passphrase.as_deref(), state)
            .await
        {
            Ok(true) => {
                self.mark_synced().await;
                let remaining = self.pending.clear_through(watermark);
                if remaining == 0 {
                    self.status.set(SyncStatus::Synced);
                } else {
                    tracing::debug!("{} changes recorded during push remain pending", remaining);
                    self.status.set(SyncStatus::Pending);
                }
                tracing::info!("Pushed state to workspace {}", workspace.id);
                true
            }
            Ok(false) => {
                tracing::error!("Workspace {} rejected the push", workspace.id);
                self.status.set(SyncStatus::Error);
                false
            }
            Err(e) => {
                tracing::error!("Push to workspace {} failed: {}", workspace.id, e);
                self.status.set(SyncStatus::Error);
                false
            }
        }
    }

    /// Fetch the bound workspace's remote state
    ///
    /// A workspace with no remote state yet leaves the status untouched.
    pub async fn pull(&self) -> Option<AppState> {
        let workspace = self.workspace()?;

        if !self.monitor.check().await {
            self.status.set(SyncStatus::Offline);
            return None;
        }

        match self.fetch_remote(&workspace).await {
            Ok(state) => state,
            Err(_) => {
                self.status.set(SyncStatus::Error);
                None
            }
        }
    }

    /// Fetch and, on success, record the sync time; a workspace without a
    /// remote document is `Ok(None)`
    async fn fetch_remote(&self, workspace: &WorkspaceInfo) -> DataResult<Option<AppState>> {
        let fetched = self
            .remote
            .fetch_state(&workspace.id.to_string())
            .await
            .inspect_err(|e| tracing::warn!("Failed to fetch workspace {}: {}", workspace.id, e))?;

        match fetched {
            Some(state) => {
                self.mark_synced().await;
                self.status.set(SyncStatus::Synced);
                tracing::debug!("Fetched remote state for workspace {}", workspace.id);
                Ok(Some(state))
            }
            None => {
                tracing::warn!("Workspace {} has no remote state", workspace.id);
                Ok(None)
            }
        }
    }

    /// Startup: bind from `url` (or the cache) and fetch remote state once
    pub async fn initialize(&self, url: Option<&Url>) -> InitOutcome {
        let cached = self.db.workspace().load_workspace().await;

        let workspace = match url.and_then(token_from_url) {
            Some(token) => self.resolver.resolve(&token, cached).await,
            None => match cached {
                Some(ws) => Some(self.resolver.refresh_short_name(ws).await),
                None => None,
            },
        };
        *self
            .workspace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = workspace.clone();

        let Some(workspace) = workspace else {
            self.status.set(SyncStatus::Offline);
            return InitOutcome::default();
        };

        self.resolver.record_visit(&workspace).await;

        if !self.monitor.check().await {
            self.status.set(SyncStatus::Offline);
            return InitOutcome {
                workspace: Some(workspace),
                remote_state: None,
            };
        }

        let remote_state = match self.fetch_remote(&workspace).await {
            Ok(Some(state)) => Some(state),
            Ok(None) | Err(_) => {
                self.status.set(SyncStatus::Error);
                None
            }
        };
        InitOutcome {
            workspace: Some(workspace),
            remote_state,
        }
    }

    /// Create a workspace and bind to it as owner
    pub async fn create_workspace(&self, passphrase: &str) -> Result<WorkspaceInfo> {
        let workspace = self.resolver.create(passphrase).await?;
        self.bind(workspace.clone());
        Ok(workspace)
    }

    /// Join a workspace with edit rights
    pub async fn join_workspace(&self, token: &str, passphrase: &str) -> Result<JoinOutcome> {
        let (outcome, workspace) = self.resolver.join(token, passphrase).await?;
        if let Some(workspace) = workspace {
            self.bind(workspace);
        }
        Ok(outcome)
    }

    /// Bind view-only; `false` when the token does not resolve
    pub async fn view_workspace(&self, token: &str) -> Result<bool> {
        match self.resolver.view(token).await? {
            Some(workspace) => {
                self.bind(workspace);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Attach `passphrase` to the bound workspace for this session if the
    /// service accepts it
    pub async fn unlock(&self, passphrase: &str) -> Result<bool> {
        let workspace = self.workspace().ok_or(CraftError::NoWorkspace)?;
        if !self.remote.verify_passphrase(workspace.id, passphrase).await? {
            tracing::warn!("Passphrase rejected for workspace {}", workspace.id);
            return Ok(false);
        }

        self.set_workspace(Some(WorkspaceInfo {
            passphrase: Some(passphrase.to_string()),
            ..workspace
        }))
        .await;
        Ok(true)
    }

    /// Replace the share token and return the new share link
    pub async fn rotate_share_link(&self) -> Result<Url> {
        let workspace = self.workspace().ok_or(CraftError::NoWorkspace)?;
        let updated = self.resolver.rotate_share_token(&workspace).await?;
        let url = self.resolver.shareable_url(&updated);
        *self
            .workspace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(updated);
        Ok(url)
    }

    /// Forget the binding, its secret and sync metadata
    pub async fn sign_out(&self) {
        self.debounce.cancel();
        self.set_workspace(None).await;
        self.db.workspace().clear_sync_meta().await;
        self.pending.clear();
        *self
            .last_synced_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.status.set(SyncStatus::Offline);
        tracing::info!("Signed out of workspace");
    }

    fn bind(&self, workspace: WorkspaceInfo) {
        self.debounce.cancel();
        self.pending.clear();
        *self
            .workspace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(workspace);
    }

    async fn mark_synced(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        *self
            .last_synced_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
        self.db
            .workspace()
            .save_sync_meta(SyncMeta {
                last_synced_at: Some(now),
            })
            .await;
    }
}
