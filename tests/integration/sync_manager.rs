//! Debounced pushes, push exclusion and sync status transitions

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pricecraft::local_db::{LocalDatabase, WorkspaceInfo};
use pricecraft::remote::DataAccessError;
use pricecraft::shared::AppState;
use pricecraft::state::MaterialInput;
use pricecraft::sync::{ChangeKind, SyncStatus};
use serde_json::json;
use uuid::Uuid;

use crate::common::{editable_store, manager, settle, view_only_store, MockRemote, DEBOUNCE, PASSPHRASE};

async fn bound_manager() -> (Arc<pricecraft::sync::SyncManager>, Arc<MockRemote>, LocalDatabase) {
    let remote = MockRemote::new();
    let db = LocalDatabase::in_memory();
    let mut workspace = WorkspaceInfo::new(Uuid::new_v4(), Some("share-abc".to_string()), None);
    workspace.passphrase = Some(PASSPHRASE.to_string());
    db.workspace().save_workspace(&workspace).await;
    (manager(&db, &remote).await, remote, db)
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_pushes_once_with_last_state() {
    let (store, remote, _) = editable_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    store.add_material(MaterialInput::new("Buttons", 0.25, "each")).await.unwrap();
    store.add_material(MaterialInput::new("Thread", 1.50, "spool")).await.unwrap();
    assert_eq!(store.status(), SyncStatus::Pending);

    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    settle().await;

    assert_eq!(remote.push_count(), 1);
    let pushed = &remote.pushes()[0];
    assert_eq!(pushed.materials.len(), 3);
    assert_eq!(pushed.materials[2].name, "Thread");
    assert_eq!(store.status(), SyncStatus::Synced);
    assert!(store.last_synced_at().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_nothing_pushed_before_quiet_period_ends() {
    let (store, remote, _) = editable_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    tokio::time::sleep(DEBOUNCE - Duration::from_millis(500)).await;
    settle().await;

    assert_eq!(remote.pushes_started(), 0);
    assert_eq!(store.status(), SyncStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_new_edit_restarts_quiet_period() {
    let (store, remote, _) = editable_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    store.add_material(MaterialInput::new("Felt", 2.00, "sheet")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;
    assert_eq!(remote.pushes_started(), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(remote.push_count(), 1);
    assert_eq!(remote.pushes()[0].materials.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_view_only_edits_are_never_pushed() {
    let (store, remote, _) = view_only_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    assert_eq!(store.status(), SyncStatus::Offline);

    tokio::time::sleep(DEBOUNCE * 2).await;
    settle().await;
    assert_eq!(remote.pushes_started(), 0);
    assert!(store.sync_manager().pending_changes().is_empty());
    assert!(!store.sync().await);
}

#[tokio::test(start_paused = true)]
async fn test_unbound_edits_stay_local() {
    let (store, remote) = crate::common::local_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    tokio::time::sleep(DEBOUNCE * 2).await;
    settle().await;

    assert_eq!(remote.pushes_started(), 0);
    assert_eq!(store.status(), SyncStatus::Offline);
    assert!(store.can_edit());
}

#[tokio::test]
async fn test_concurrent_sync_is_rejected() {
    let (manager, remote, _) = bound_manager().await;
    let gate = remote.hold_pushes();
    let state = AppState::default();

    let first = tokio::spawn({
        let manager = Arc::clone(&manager);
        let state = state.clone();
        async move { manager.sync(&state).await }
    });
    while remote.pushes_started() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(manager.is_syncing());
    assert_eq!(manager.status(), SyncStatus::Syncing);
    assert!(!manager.sync(&state).await);

    gate.notify_one();
    assert!(first.await.unwrap());
    assert_eq!(remote.pushes_started(), 1);
    assert_eq!(remote.push_count(), 1);
    assert!(!manager.is_syncing());
    assert_eq!(manager.status(), SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_firing_mid_push_is_dropped() {
    let (store, remote, _) = editable_store().await;
    let gate = remote.hold_pushes();

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(remote.pushes_started(), 1);

    store.add_material(MaterialInput::new("Felt", 2.00, "sheet")).await.unwrap();
    assert_eq!(store.status(), SyncStatus::Syncing);
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(remote.pushes_started(), 1);

    gate.notify_one();
    settle().await;
    assert_eq!(remote.push_count(), 1);
    assert_eq!(remote.pushes()[0].materials.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_push_stays_pending() {
    let (store, remote, _) = editable_store().await;
    let gate = remote.hold_pushes();

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(remote.pushes_started(), 1);

    store.add_material(MaterialInput::new("Felt", 2.00, "sheet")).await.unwrap();
    assert_eq!(store.sync_manager().pending_changes().len(), 2);

    gate.notify_one();
    settle().await;

    assert_eq!(remote.push_count(), 1);
    assert_eq!(remote.pushes()[0].materials.len(), 1);
    let pending = store.sync_manager().pending_changes();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].table, "materials");
    assert_eq!(store.status(), SyncStatus::Pending);
    assert!(store.last_synced_at().is_some());
    store.sync_manager().cancel_scheduled_push();
}

#[tokio::test]
async fn test_pull_without_remote_state_keeps_status() {
    let (manager, remote, _) = bound_manager().await;
    manager.queue_change(ChangeKind::Insert, "materials", json!({}));
    assert_eq!(manager.status(), SyncStatus::Pending);

    assert!(manager.pull().await.is_none());
    assert_eq!(manager.status(), SyncStatus::Pending);
    assert_eq!(manager.pending_changes().len(), 1);
    assert_eq!(remote.pushes_started(), 0);
}

#[tokio::test]
async fn test_unreachable_service_goes_offline() {
    let (manager, remote, _) = bound_manager().await;
    remote.set_reachable(false);

    assert!(!manager.sync(&AppState::default()).await);
    assert_eq!(manager.status(), SyncStatus::Offline);
    assert_eq!(remote.pushes_started(), 0);
    assert!(manager.pull().await.is_none());
}

#[tokio::test]
async fn test_push_failure_sets_error_and_keeps_pending() {
    let (manager, remote, _) = bound_manager().await;
    remote.set_push_result(Err(DataAccessError::network("connection reset")));

    manager.queue_change(ChangeKind::Insert, "materials", json!({"name": "Yarn"}));
    assert_eq!(manager.status(), SyncStatus::Pending);

    assert!(!manager.sync(&AppState::default()).await);
    assert_eq!(manager.status(), SyncStatus::Error);
    assert_eq!(manager.pending_changes().len(), 1);
    assert!(manager.last_synced_at().is_none());
}

#[tokio::test]
async fn test_declined_push_sets_error() {
    let (manager, remote, _) = bound_manager().await;
    remote.set_push_result(Ok(false));

    assert!(!manager.sync(&AppState::default()).await);
    assert_eq!(manager.status(), SyncStatus::Error);
}

#[tokio::test]
async fn test_successful_push_clears_pending_and_records_time() {
    let (manager, remote, db) = bound_manager().await;
    manager.queue_change(ChangeKind::Update, "settings", json!({}));

    assert!(manager.sync(&AppState::default()).await);
    assert!(manager.pending_changes().is_empty());
    assert_eq!(remote.push_count(), 1);

    let saved = db.workspace().load_sync_meta().await.last_synced_at;
    assert!(saved.is_some());
    assert_eq!(saved, manager.last_synced_at());
}

#[tokio::test]
async fn test_status_observers_see_transitions() {
    let (manager, _remote, _) = bound_manager().await;
    let mut rx = manager.subscribe();
    assert_eq!(*rx.borrow_and_update(), SyncStatus::Offline);

    manager.queue_change(ChangeKind::Insert, "materials", json!({}));
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), SyncStatus::Pending);

    manager.sync(&AppState::default()).await;
    assert_eq!(*rx.borrow_and_update(), SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_sync_cancels_armed_push() {
    let (store, remote, _) = editable_store().await;

    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    assert!(store.sync().await);
    assert_eq!(remote.push_count(), 1);

    tokio::time::sleep(DEBOUNCE * 2).await;
    settle().await;
    assert_eq!(remote.push_count(), 1);
}

#[tokio::test]
async fn test_sync_without_workspace_is_noop() {
    let remote = MockRemote::new();
    let manager = manager(&LocalDatabase::in_memory(), &remote).await;

    assert!(!manager.sync(&AppState::default()).await);
    assert_eq!(manager.status(), SyncStatus::Offline);
    assert_matches!(manager.pull().await, None);
    assert_eq!(remote.pushes_started(), 0);
}
