//! # Craft Store
//!
//! The single in-memory source of truth the front end reads and mutates.
//!
//! `CraftStore` is constructed with its dependencies (local database and
//! sync manager) rather than living in a global, so tests and multiple
//! instances stay isolated.
//!
//! ## Mutation pattern
//!
//! Every mutation works on a copy of the state, validates the result, then
//! swaps it in and calls `persist`:
//!
//! 1. the new state is written to the local store
//! 2. if an editable workspace is bound, the change is recorded as pending
//!    and a debounced push of the new state is armed
//!
//! A mutation that would leave the state invalid is rejected and nothing is
//! written. Writers are serialized, so the local store always ends up with
//! the last committed state. Observers follow the state through a `watch`
//! channel.

mod actions;

use std::sync::Arc;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::local_db::{LocalDatabase, LocalStore, WorkspaceInfo};
use crate::remote::{DataAccess, Disconnected, RestDataAccess};
use crate::shared::config::AppConfig;
use crate::shared::error::{CraftError, Result};
use crate::shared::models::AppState;
use crate::shared::pricing::{self, PriceBreakdown};
use crate::shared::validation::{check_invariants, ValidationResult};
use crate::sync::{ChangeKind, JoinOutcome, SyncManager, SyncStatus};

pub use actions::{MaterialInput, ProjectInput};

/// Table name used for whole-state replacements in the pending-change log
const STATE_TABLE: &str = "state";

/// Observable application state with local persistence and remote sync
pub struct CraftStore {
    state: watch::Sender<AppState>,
    db: LocalDatabase,
    sync: Arc<SyncManager>,
    /// Held from a mutation until its state is saved
    writer: Mutex<()>,
}

impl CraftStore {
    /// Store over `db`, starting from whatever state it holds
    pub async fn new(db: LocalDatabase, sync: Arc<SyncManager>) -> Self {
        let (state, _rx) = watch::channel(db.state().load().await);
        Self {
            state,
            db,
            sync,
            writer: Mutex::new(()),
        }
    }

    /// Open the on-disk store and the configured workspace service
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let db = LocalDatabase::open(config.resolved_data_dir()).await?;
        let remote: Arc<dyn DataAccess> = match RestDataAccess::from_config(config) {
            Some(rest) => Arc::new(rest),
            None => {
                tracing::info!("No workspace service configured; running in local mode");
                Arc::new(Disconnected)
            }
        };
        let sync = SyncManager::new(db.clone(), remote, config).await;
        Ok(Self::new(db, sync).await)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Read the current state without copying it
    pub fn with_state<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync.subscribe()
    }

    pub fn last_synced_at(&self) -> Option<i64> {
        self.sync.last_synced_at()
    }

    pub fn workspace(&self) -> Option<WorkspaceInfo> {
        self.sync.workspace()
    }

    /// `true` with no workspace bound, or with a passphrase-bearing one
    pub fn can_edit(&self) -> bool {
        self.sync.can_edit()
    }

    pub fn shareable_url(&self) -> Option<Url> {
        self.sync.shareable_url()
    }

    /// Price breakdown for one project
    pub fn price_project(&self, project_id: Uuid) -> Result<PriceBreakdown> {
        self.with_state(|state| {
            let project = state
                .project(project_id)
                .ok_or_else(|| CraftError::not_found("project", project_id))?;
            Ok(pricing::price_project(state, project))
        })
    }

    /// Suggested price formatted with the configured currency symbol
    pub fn formatted_price(&self, project_id: Uuid) -> Result<String> {
        let breakdown = self.price_project(project_id)?;
        Ok(self.with_state(|state| {
            pricing::format_currency(breakdown.total, &state.settings.currency_symbol)
        }))
    }

    /// Pretty-printed JSON backup of the current state
    pub fn export(&self) -> Result<String> {
        self.with_state(LocalStore::export)
    }

    /// Parse a backup and, if valid, replace the whole state with it
    pub async fn import_json(&self, json: &str) -> ValidationResult {
        let state = LocalStore::import(json)?;
        self.import_state(state.clone()).await;
        Ok(state)
    }

    /// Replace the whole state (no merge) and persist once
    pub async fn import_state(&self, state: AppState) {
        self.replace(state).await;
    }

    /// Back to defaults, persisted and pushed like any other mutation
    pub async fn reset_state(&self) {
        self.replace(AppState::default()).await;
    }

    /// Wipe everything on this device and leave the workspace, without
    /// pushing the emptied state anywhere
    pub async fn reset_local_state(&self) {
        let _write = self.writer.lock().await;
        self.sync.sign_out().await;
        self.db.clear_local_data().await;
        self.state.send_replace(AppState::default());
        tracing::info!("Local data cleared");
    }

    /// Remember the selected project; local only, never pushed
    pub async fn set_last_selected(&self, project_id: Option<Uuid>) -> Result<()> {
        let _write = self.writer.lock().await;
        if let Some(id) = project_id {
            if self.with_state(|state| state.project(id).is_none()) {
                return Err(CraftError::not_found("project", id));
            }
        }

        let changed = self.state.send_if_modified(|state| {
            if state.last_selected_project_id == project_id {
                return false;
            }
            state.last_selected_project_id = project_id;
            true
        });
        if changed {
            self.db.state().save(&self.snapshot()).await;
        }
        Ok(())
    }

    /// Startup: resolve the workspace (from `url` or the cache), then let
    /// the binding decide which side wins
    ///
    /// Edit-capable bindings treat local state as authoritative and schedule
    /// a push; view-only bindings take the remote state.
    pub async fn initialize(&self, url: Option<&Url>) -> Option<WorkspaceInfo> {
        let outcome = self.sync.initialize(url).await;

        if let (Some(workspace), Some(remote)) = (&outcome.workspace, outcome.remote_state) {
            if workspace.can_edit() {
                self.sync.schedule_push(self.snapshot());
            } else {
                self.apply_remote(remote).await;
            }
        }
        outcome.workspace
    }

    /// Push the current state now; `false` if nothing was pushed
    pub async fn sync(&self) -> bool {
        if !self.sync.push_enabled() {
            return false;
        }
        self.sync.cancel_scheduled_push();
        self.sync.sync(&self.snapshot()).await
    }

    /// Replace local state with the remote one; `false` if nothing came back
    pub async fn pull(&self) -> bool {
        match self.sync.pull().await {
            Some(remote) => {
                self.sync.cancel_scheduled_push();
                self.apply_remote(remote).await;
                true
            }
            None => false,
        }
    }

    /// Create a workspace from this device's data and push it there
    pub async fn create_workspace(&self, passphrase: &str) -> Result<WorkspaceInfo> {
        let workspace = self.sync.create_workspace(passphrase).await?;
        self.sync.schedule_push(self.snapshot());
        Ok(workspace)
    }

    /// Join a workspace with edit rights, adopting its remote state
    pub async fn join_workspace(&self, token: &str, passphrase: &str) -> Result<JoinOutcome> {
        let outcome = self.sync.join_workspace(token, passphrase).await?;
        if outcome.passphrase_valid {
            self.pull().await;
        }
        Ok(outcome)
    }

    /// Follow a workspace view-only, adopting its remote state
    pub async fn view_workspace(&self, token: &str) -> Result<bool> {
        let bound = self.sync.view_workspace(token).await?;
        if bound {
            self.pull().await;
        }
        Ok(bound)
    }

    /// Regain edit rights on the cached binding; `false` if the passphrase
    /// was rejected
    pub async fn unlock(&self, passphrase: &str) -> Result<bool> {
        self.sync.unlock(passphrase).await
    }

    pub async fn rotate_share_link(&self) -> Result<Url> {
        self.sync.rotate_share_link().await
    }

    /// Leave the workspace but keep local data
    pub async fn sign_out(&self) {
        self.sync.sign_out().await;
    }

    /// Remote state overwrites everything but the local UI selection
    async fn apply_remote(&self, remote: AppState) {
        let _write = self.writer.lock().await;
        let mut next = self.snapshot();
        next.overwrite_from_remote(remote);

        self.state.send_replace(next.clone());
        self.db.state().save(&next).await;
        tracing::info!("Applied remote workspace state");
    }

    async fn replace(&self, next: AppState) {
        let _write = self.writer.lock().await;
        self.state.send_replace(next.clone());
        self.persist(next, ChangeKind::Update, STATE_TABLE, Value::Null)
            .await;
    }

    /// Apply `change` to a copy of the state and commit it if the result is
    /// still valid
    async fn commit<T, F>(&self, kind: ChangeKind, table: &str, change: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce(&mut AppState) -> Result<T>,
    {
        let _write = self.writer.lock().await;

        let mut next = self.snapshot();
        let value = change(&mut next)
            .and_then(|value| match check_invariants(&next).into_iter().next() {
                Some(issue) => Err(CraftError::validation(issue.path, issue.message)),
                None => Ok(value),
            })
            .inspect_err(|e| tracing::debug!("Rejected {} change: {}", table, e))?;

        let data = serde_json::to_value(&value).unwrap_or(Value::Null);
        self.state.send_replace(next.clone());
        self.persist(next, kind, table, data).await;
        Ok(value)
    }

    /// Save locally and, for an editable workspace, schedule a push
    async fn persist(&self, state: AppState, kind: ChangeKind, table: &str, data: Value) {
        self.db.state().save(&state).await;

        if self.sync.push_enabled() {
            self.sync.queue_change(kind, table, data);
            self.sync.schedule_push(state);
        }
    }
}
