//! # Workspace Binding Storage
//!
//! Local record of the remote workspace this device is bound to, plus the
//! last-sync metadata.
//!
//! The passphrase is never written into the workspace record. It goes to a
//! separate secret store (in-memory by default, so it does not outlive the
//! session) keyed by workspace id, so a secret can never be applied to a
//! different workspace than the one it was entered for.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    read_migrating, KeyValueStore, LEGACY_SYNC_META_KEY, LEGACY_WORKSPACE_KEY, PASSPHRASE_KEY,
    SYNC_META_KEY, WORKSPACE_KEY,
};
use crate::shared::error::Result;

/// Local binding to a remote workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInfo {
    /// Durable workspace identifier
    pub id: Uuid,
    /// Rotatable public token used in share links
    #[serde(default)]
    pub share_token: Option<String>,
    /// Vanity alias; a display hint only, never used to resolve
    #[serde(default)]
    pub short_name: Option<String>,
    /// Present means this device may edit; stored separately, see module docs
    #[serde(skip)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl WorkspaceInfo {
    pub fn new(id: Uuid, share_token: Option<String>, short_name: Option<String>) -> Self {
        Self {
            id,
            share_token,
            short_name,
            passphrase: None,
            is_owner: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether this binding carries edit credentials
    pub fn can_edit(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Token to put in share links: the share token, else the id
    pub fn link_token(&self) -> String {
        self.share_token
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSecret {
    workspace_id: Uuid,
    passphrase: String,
}

/// Metadata about the last successful sync
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Epoch milliseconds
    pub last_synced_at: Option<i64>,
}

/// Workspace binding + secret + sync metadata
#[derive(Clone)]
pub struct WorkspaceStore {
    kv: Arc<dyn KeyValueStore>,
    secrets: Arc<dyn KeyValueStore>,
}

impl WorkspaceStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, secrets: Arc<dyn KeyValueStore>) -> Self {
        Self { kv, secrets }
    }

    /// Load the bound workspace, if any, with its passphrase attached
    pub async fn load_workspace(&self) -> Option<WorkspaceInfo> {
        let raw = match read_migrating(self.kv.as_ref(), WORKSPACE_KEY, LEGACY_WORKSPACE_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read workspace info: {}", e);
                return None;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Stored workspace info is not valid JSON: {}", e);
                return None;
            }
        };
        let mut workspace: WorkspaceInfo = match serde_json::from_value(value.clone()) {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::warn!("Stored workspace info is malformed: {}", e);
                return None;
            }
        };

        // Older records kept the passphrase inline; move it out.
        if let Some(inline) = value.get("passphrase").and_then(|p| p.as_str()) {
            workspace.passphrase = Some(inline.to_string());
            self.save_workspace(&workspace).await;
            return Some(workspace);
        }

        workspace.passphrase = self.load_secret(workspace.id).await;
        Some(workspace)
    }

    /// Persist the binding; the passphrase goes to the secret store
    pub async fn save_workspace(&self, workspace: &WorkspaceInfo) {
        if let Err(e) = self.try_save_workspace(workspace).await {
            tracing::warn!("Failed to save workspace info: {}", e);
        }
    }

    async fn try_save_workspace(&self, workspace: &WorkspaceInfo) -> Result<()> {
        self.kv
            .set(WORKSPACE_KEY, &serde_json::to_string(workspace)?)
            .await?;
        match &workspace.passphrase {
            Some(passphrase) => {
                let secret = StoredSecret {
                    workspace_id: workspace.id,
                    passphrase: passphrase.clone(),
                };
                self.secrets
                    .set(PASSPHRASE_KEY, &serde_json::to_string(&secret)?)
                    .await
            }
            None => self.secrets.remove(PASSPHRASE_KEY).await,
        }
    }

    async fn load_secret(&self, workspace_id: Uuid) -> Option<String> {
        let raw = self.secrets.get(PASSPHRASE_KEY).await.ok()??;
        let secret: StoredSecret = serde_json::from_str(&raw).ok()?;
        (secret.workspace_id == workspace_id).then_some(secret.passphrase)
    }

    /// Wipe the stored passphrase
    pub async fn clear_secret(&self) {
        if let Err(e) = self.secrets.remove(PASSPHRASE_KEY).await {
            tracing::warn!("Failed to clear workspace secret: {}", e);
        }
    }

    /// Forget the binding entirely, secret included
    pub async fn clear_workspace(&self) {
        for key in [WORKSPACE_KEY, LEGACY_WORKSPACE_KEY] {
            if let Err(e) = self.kv.remove(key).await {
                tracing::warn!("Failed to remove {}: {}", key, e);
            }
        }
        self.clear_secret().await;
    }

    pub async fn load_sync_meta(&self) -> SyncMeta {
        read_migrating(self.kv.as_ref(), SYNC_META_KEY, LEGACY_SYNC_META_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub async fn save_sync_meta(&self, meta: SyncMeta) {
        let result = match serde_json::to_string(&meta) {
            Ok(json) => self.kv.set(SYNC_META_KEY, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to save sync metadata: {}", e);
        }
    }

    pub async fn clear_sync_meta(&self) {
        for key in [SYNC_META_KEY, LEGACY_SYNC_META_KEY] {
            if let Err(e) = self.kv.remove(key).await {
                tracing::warn!("Failed to remove {}: {}", key, e);
            }
        }
    }
}
