//! # Workspace Identity Resolver
//!
//! Translates between URL-carried workspace tokens and the locally cached
//! workspace binding.
//!
//! ## Rules
//!
//! - A token that fails to resolve clears the local binding (fail closed)
//! - Resolving to the cached workspace keeps its passphrase; resolving to a
//!   different one starts view-only and wipes the stored secret
//! - Share links carry only the token (`w`) and the optional vanity name
//!   (`n`); every other query parameter is stripped

use std::sync::Arc;

use reqwest::Url;
use uuid::Uuid;

use crate::local_db::{LocalDatabase, WorkspaceInfo};
use crate::remote::{DataAccess, DataAccessError};
use crate::shared::error::{CraftError, Result};

/// Query parameter carrying the share token
pub const TOKEN_PARAM: &str = "w";
/// Query parameter carrying the cosmetic short name
pub const NAME_PARAM: &str = "n";

/// Workspace token carried by `url`, if any
pub fn token_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Rewrite `base` into a share link for `workspace`
pub fn shareable_url(base: &Url, workspace: &WorkspaceInfo) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(TOKEN_PARAM, &workspace.link_token());
        if let Some(name) = workspace.short_name.as_deref().filter(|n| !n.is_empty()) {
            query.append_pair(NAME_PARAM, name);
        }
    }
    url
}

/// Outcome of joining a workspace with a passphrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The token resolved to a workspace
    pub found: bool,
    /// The passphrase was accepted
    pub passphrase_valid: bool,
}

/// Resolves tokens and manages the persisted binding
pub struct WorkspaceResolver {
    db: LocalDatabase,
    remote: Arc<dyn DataAccess>,
    app_url: Url,
}

impl WorkspaceResolver {
    pub fn new(db: LocalDatabase, remote: Arc<dyn DataAccess>, app_url: Url) -> Self {
        Self {
            db,
            remote,
            app_url,
        }
    }

    pub fn app_url(&self) -> &Url {
        &self.app_url
    }

    pub fn shareable_url(&self, workspace: &WorkspaceInfo) -> Url {
        shareable_url(&self.app_url, workspace)
    }

    /// Resolve a URL token against the cached binding
    ///
    /// Returns the new binding (already persisted), or `None` after clearing
    /// the local binding when the token does not resolve.
    pub async fn resolve(&self, token: &str, cached: Option<WorkspaceInfo>) -> Option<WorkspaceInfo> {
        let lookup = match self.remote.resolve_token(token).await {
            Ok(Some(lookup)) => lookup,
            Ok(None) => {
                tracing::warn!("Workspace token did not resolve; clearing local binding");
                self.db.workspace().clear_workspace().await;
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to resolve workspace token: {}; clearing local binding", e);
                self.db.workspace().clear_workspace().await;
                return None;
            }
        };

        let share_token = share_token_from(token, lookup.id);
        let workspace = match cached.filter(|cached| cached.id == lookup.id) {
            Some(mut same) => {
                same.short_name = lookup.short_name.or(same.short_name);
                if share_token.is_some() {
                    same.share_token = share_token;
                }
                same
            }
            None => {
                self.db.workspace().clear_secret().await;
                WorkspaceInfo::new(lookup.id, share_token, lookup.short_name)
            }
        };

        self.db.workspace().save_workspace(&workspace).await;
        tracing::info!(
            "Bound to workspace {} ({})",
            workspace.id,
            if workspace.can_edit() { "edit" } else { "view-only" }
        );
        Some(workspace)
    }

    /// Fill in a missing short name from the service; best effort
    pub async fn refresh_short_name(&self, workspace: WorkspaceInfo) -> WorkspaceInfo {
        if workspace.short_name.is_some() {
            return workspace;
        }

        match self.remote.resolve_token(&workspace.id.to_string()).await {
            Ok(Some(lookup)) if lookup.short_name.is_some() => {
                let refreshed = WorkspaceInfo {
                    short_name: lookup.short_name,
                    ..workspace
                };
                self.db.workspace().save_workspace(&refreshed).await;
                refreshed
            }
            Ok(_) => workspace,
            Err(e) => {
                tracing::debug!("Could not refresh workspace short name: {}", e);
                workspace
            }
        }
    }

    /// Remember `workspace` in the recent-visit history
    pub async fn record_visit(&self, workspace: &WorkspaceInfo) {
        let url = self.shareable_url(workspace);
        self.db.history().record_visit(workspace.id, url.as_str()).await;
    }

    /// Create a workspace owned by this device
    pub async fn create(&self, passphrase: &str) -> Result<WorkspaceInfo> {
        let created = self.remote.create_workspace(passphrase).await?;

        let mut workspace = WorkspaceInfo::new(created.id, created.share_token, created.short_name);
        workspace.passphrase = Some(passphrase.to_string());
        workspace.is_owner = true;

        self.db.workspace().save_workspace(&workspace).await;
        self.record_visit(&workspace).await;
        tracing::info!("Created workspace {}", workspace.id);
        Ok(workspace)
    }

    /// Bind to an existing workspace with edit rights if `passphrase` checks out
    pub async fn join(&self, token: &str, passphrase: &str) -> Result<(JoinOutcome, Option<WorkspaceInfo>)> {
        let Some(lookup) = self.remote.resolve_token(token).await? else {
            let outcome = JoinOutcome {
                found: false,
                passphrase_valid: false,
            };
            return Ok((outcome, None));
        };

        let passphrase_valid = self.remote.verify_passphrase(lookup.id, passphrase).await?;
        let outcome = JoinOutcome {
            found: true,
            passphrase_valid,
        };
        if !passphrase_valid {
            tracing::warn!("Passphrase rejected for workspace {}", lookup.id);
            return Ok((outcome, None));
        }

        let mut workspace = WorkspaceInfo::new(lookup.id, share_token_from(token, lookup.id), lookup.short_name);
        workspace.passphrase = Some(passphrase.to_string());

        self.db.workspace().save_workspace(&workspace).await;
        self.record_visit(&workspace).await;
        tracing::info!("Joined workspace {}", workspace.id);
        Ok((outcome, Some(workspace)))
    }

    /// Bind to a workspace view-only
    pub async fn view(&self, token: &str) -> Result<Option<WorkspaceInfo>> {
        let Some(lookup) = self.remote.resolve_token(token).await? else {
            return Ok(None);
        };

        let workspace = WorkspaceInfo::new(lookup.id, share_token_from(token, lookup.id), lookup.short_name);
        self.db.workspace().save_workspace(&workspace).await;
        self.record_visit(&workspace).await;
        tracing::info!("Viewing workspace {}", workspace.id);
        Ok(Some(workspace))
    }

    /// Issue a new share token for an edit-capable binding
    pub async fn rotate_share_token(&self, workspace: &WorkspaceInfo) -> Result<WorkspaceInfo> {
        let Some(passphrase) = workspace.passphrase.as_deref() else {
            return Err(CraftError::ReadOnly);
        };

        let token = self
            .remote
            .rotate_share_token(workspace.id, Some(passphrase))
            .await?
            .ok_or_else(|| CraftError::from(DataAccessError::protocol("share token rotation returned nothing")))?;

        let updated = WorkspaceInfo {
            share_token: Some(token),
            ..workspace.clone()
        };
        self.db.workspace().save_workspace(&updated).await;
        tracing::info!("Rotated share token for workspace {}", updated.id);
        Ok(updated)
    }
}

/// The token is a share token unless it is just the workspace id
fn share_token_from(token: &str, workspace_id: Uuid) -> Option<String> {
    match Uuid::parse_str(token) {
        Ok(id) if id == workspace_id => None,
        _ => Some(token.to_string()),
    }
}
