//! Startup resolution and workspace lifecycle: create, join, view, rotate,
//! unlock and sign out

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pricecraft::local_db::{KeyValueStore, LocalDatabase, MemoryStore, WorkspaceInfo, PASSPHRASE_KEY};
use pricecraft::shared::{AppState, CraftError, Material};
use pricecraft::state::{MaterialInput, ProjectInput};
use pricecraft::sync::SyncStatus;
use reqwest::Url;
use uuid::Uuid;

use crate::common::{
    editable_store, local_store, settle, store_with, view_only_store, MockRemote, DEBOUNCE, PASSPHRASE,
};

fn remote_state_with(name: &str) -> AppState {
    let mut state = AppState::default();
    state.materials.push(Material {
        id: Uuid::new_v4(),
        name: name.to_string(),
        unit_cost: 3.0,
        unit: "ball".to_string(),
        notes: None,
    });
    state
}

fn link(token: &str) -> Url {
    Url::parse(&format!("https://pricecraft.test/?w={}", token)).unwrap()
}

#[tokio::test]
async fn test_initialize_without_workspace_stays_offline() {
    let (store, remote) = local_store().await;

    assert_eq!(store.initialize(None).await, None);
    assert_eq!(store.status(), SyncStatus::Offline);
    assert!(store.can_edit());
    assert_eq!(remote.pushes_started(), 0);
}

#[tokio::test]
async fn test_initialize_view_only_takes_remote_state() {
    let (store, remote, _) = view_only_store().await;
    let project = store.add_project(ProjectInput::new("Local scarf")).await.unwrap();
    store.set_last_selected(Some(project.id)).await.unwrap();
    remote.set_remote_state(remote_state_with("Remote yarn"));

    let workspace = store.initialize(None).await.unwrap();

    assert!(!workspace.can_edit());
    assert_eq!(workspace.short_name.as_deref(), Some("shop"));
    let state = store.snapshot();
    assert_eq!(state.materials.len(), 1);
    assert_eq!(state.materials[0].name, "Remote yarn");
    assert!(state.projects.is_empty());
    assert_eq!(state.last_selected_project_id, Some(project.id));
    assert_eq!(store.status(), SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_editable_pushes_local_state() {
    let (store, remote, _) = editable_store().await;
    store.add_material(MaterialInput::new("Local yarn", 5.99, "skein")).await.unwrap();
    remote.set_remote_state(remote_state_with("Remote yarn"));

    store.initialize(None).await.unwrap();
    assert_eq!(store.snapshot().materials[0].name, "Local yarn");

    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(remote.push_count(), 1);
    assert_eq!(remote.pushes()[0].materials[0].name, "Local yarn");
}

#[tokio::test]
async fn test_initialize_unreachable_keeps_binding() {
    let (store, remote, id) = editable_store().await;
    remote.set_reachable(false);

    let workspace = store.initialize(None).await.unwrap();
    assert_eq!(workspace.id, id);
    assert!(store.can_edit());
    assert_eq!(store.status(), SyncStatus::Offline);
}

#[tokio::test]
async fn test_unknown_token_clears_binding() {
    let remote = MockRemote::new();
    let db = LocalDatabase::in_memory();
    let mut cached = WorkspaceInfo::new(Uuid::new_v4(), None, None);
    cached.passphrase = Some(PASSPHRASE.to_string());
    db.workspace().save_workspace(&cached).await;
    let store = store_with(db.clone(), &remote).await;

    assert_eq!(store.initialize(Some(&link("nope"))).await, None);
    assert!(store.workspace().is_none());
    assert!(store.can_edit());
    assert!(db.workspace().load_workspace().await.is_none());
    assert_eq!(store.status(), SyncStatus::Offline);
}

#[tokio::test]
async fn test_same_workspace_link_keeps_passphrase() {
    let (store, remote, id) = editable_store().await;
    remote.register("newer-token", id, Some("renamed"));

    let workspace = store.initialize(Some(&link("newer-token"))).await.unwrap();
    assert_eq!(workspace.id, id);
    assert_eq!(workspace.passphrase.as_deref(), Some(PASSPHRASE));
    assert_eq!(workspace.share_token.as_deref(), Some("newer-token"));
    assert_eq!(workspace.short_name.as_deref(), Some("renamed"));
    assert!(store.can_edit());
}

#[tokio::test]
async fn test_other_workspace_link_wipes_secret() {
    let remote = MockRemote::new();
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let secrets = Arc::new(MemoryStore::new());
    let db = LocalDatabase::with_stores(kv, secrets.clone());
    let mut cached = WorkspaceInfo::new(Uuid::new_v4(), None, None);
    cached.passphrase = Some(PASSPHRASE.to_string());
    db.workspace().save_workspace(&cached).await;
    assert!(secrets.get(PASSPHRASE_KEY).await.unwrap().is_some());

    let other = Uuid::new_v4();
    remote.register("other", other, None);
    let store = store_with(db.clone(), &remote).await;

    let workspace = store.initialize(Some(&link("other"))).await.unwrap();
    assert_eq!(workspace.id, other);
    assert_eq!(workspace.passphrase, None);
    assert!(!store.can_edit());
    assert_eq!(secrets.get(PASSPHRASE_KEY).await.unwrap(), None);
    assert_eq!(db.workspace().load_workspace().await.unwrap().id, other);
}

#[tokio::test]
async fn test_initialize_records_visit() {
    let remote = MockRemote::new();
    let id = Uuid::new_v4();
    remote.register("share-abc", id, Some("shop"));
    let db = LocalDatabase::in_memory();
    let store = store_with(db.clone(), &remote).await;

    store.initialize(Some(&link("share-abc"))).await.unwrap();

    let url = store.shareable_url().unwrap();
    assert_eq!(url.query(), Some("w=share-abc&n=shop"));
    assert!(url.as_str().starts_with("https://pricecraft.test/"));

    let visits = db.history().load().await;
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].id, id);
    assert_eq!(visits[0].url, url.as_str());
}

#[tokio::test(start_paused = true)]
async fn test_create_workspace_pushes_local_data() {
    let (store, remote) = local_store().await;
    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();

    let workspace = store.create_workspace(PASSPHRASE).await.unwrap();
    assert!(workspace.is_owner);
    assert!(store.can_edit());
    assert_eq!(store.status(), SyncStatus::Pending);

    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(remote.push_count(), 1);
    assert_eq!(remote.pushes()[0].materials[0].name, "Yarn");
}

#[tokio::test]
async fn test_join_checks_passphrase() {
    let (store, remote) = local_store().await;
    let id = Uuid::new_v4();
    remote.register("team", id, Some("team-shop"));
    remote.set_remote_state(remote_state_with("Shared felt"));

    let missing = store.join_workspace("unknown", PASSPHRASE).await.unwrap();
    assert!(!missing.found);

    let rejected = store.join_workspace("team", "wrong").await.unwrap();
    assert!(rejected.found);
    assert!(!rejected.passphrase_valid);
    assert!(store.workspace().is_none());

    let joined = store.join_workspace("team", PASSPHRASE).await.unwrap();
    assert!(joined.found && joined.passphrase_valid);
    assert!(store.can_edit());
    assert_eq!(store.workspace().unwrap().id, id);
    assert_eq!(store.snapshot().materials[0].name, "Shared felt");
}

#[tokio::test]
async fn test_view_workspace_is_read_only() {
    let (store, remote) = local_store().await;
    remote.register("team", Uuid::new_v4(), None);
    remote.set_remote_state(remote_state_with("Shared felt"));

    assert!(!store.view_workspace("unknown").await.unwrap());
    assert!(store.view_workspace("team").await.unwrap());
    assert!(!store.can_edit());
    assert_eq!(store.snapshot().materials[0].name, "Shared felt");
}

#[tokio::test]
async fn test_pull_overwrites_view_only_edits() {
    let (store, remote, _) = view_only_store().await;
    remote.set_remote_state(remote_state_with("Remote yarn"));
    store.add_material(MaterialInput::new("Scratch", 1.0, "each")).await.unwrap();

    assert!(store.pull().await);
    let names: Vec<_> = store.snapshot().materials.into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Remote yarn".to_string()]);
}

#[tokio::test]
async fn test_missing_remote_state_is_error_only_at_startup() {
    let (store, remote, _) = view_only_store().await;

    store.initialize(None).await.unwrap();
    assert_eq!(store.status(), SyncStatus::Error);

    remote.set_remote_state(remote_state_with("Remote yarn"));
    assert!(store.pull().await);
    assert_eq!(store.status(), SyncStatus::Synced);

    remote.clear_remote_state();
    assert!(!store.pull().await);
    assert_eq!(store.status(), SyncStatus::Synced);
    assert_eq!(store.snapshot().materials[0].name, "Remote yarn");
}

#[tokio::test]
async fn test_rotate_share_link() {
    let (store, remote, _) = editable_store().await;

    let url = store.rotate_share_link().await.unwrap();
    assert_eq!(remote.rotations(), 1);
    assert!(url.query().unwrap().contains("w=rotated-1"));
    assert_eq!(store.workspace().unwrap().share_token.as_deref(), Some("rotated-1"));
}

#[tokio::test]
async fn test_rotate_requires_edit_rights() {
    let (store, remote, _) = view_only_store().await;
    assert_matches!(store.rotate_share_link().await, Err(CraftError::ReadOnly));
    assert_eq!(remote.rotations(), 0);

    let (unbound, _) = local_store().await;
    assert_matches!(unbound.rotate_share_link().await, Err(CraftError::NoWorkspace));
}

#[tokio::test]
async fn test_unlock_restores_edit_rights() {
    let (store, _remote, _) = view_only_store().await;

    assert!(!store.unlock("wrong").await.unwrap());
    assert!(!store.can_edit());

    assert!(store.unlock(PASSPHRASE).await.unwrap());
    assert!(store.can_edit());
    assert!(store.sync_manager().push_enabled());
}

#[tokio::test]
async fn test_sign_out_keeps_local_data() {
    let (store, _remote, _) = editable_store().await;
    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();

    store.sign_out().await;
    assert!(store.workspace().is_none());
    assert!(store.can_edit());
    assert_eq!(store.status(), SyncStatus::Offline);
    assert_eq!(store.snapshot().materials.len(), 1);
    assert!(store.sync_manager().pending_changes().is_empty());
}

#[tokio::test]
async fn test_reset_local_state_wipes_everything() {
    let remote = MockRemote::new();
    let db = LocalDatabase::in_memory();
    let store = store_with(db.clone(), &remote).await;
    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    store.create_workspace(PASSPHRASE).await.unwrap();

    store.reset_local_state().await;
    assert_eq!(store.snapshot(), AppState::default());
    assert!(store.workspace().is_none());
    assert_eq!(db.state().load().await, AppState::default());
    assert!(db.history().load().await.is_empty());
    assert_eq!(remote.push_count(), 0);
}
