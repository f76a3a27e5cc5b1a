//! On-disk persistence through `LocalDatabase::open` and the SQLite store

use std::sync::Arc;

use pricecraft::local_db::{
    KeyValueStore, LocalDatabase, MemoryStore, SqliteStore, WorkspaceInfo, DB_FILE,
    LEGACY_STATE_KEY, STATE_KEY, WORKSPACE_KEY,
};
use pricecraft::shared::AppState;
use pricecraft::state::{MaterialInput, ProjectInput};
use tempfile::TempDir;
use uuid::Uuid;

use crate::common::{store_with, MockRemote, PASSPHRASE};

async fn raw_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join(DB_FILE)).await.unwrap()
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let remote = MockRemote::new();

    let store = store_with(LocalDatabase::open(dir.path()).await.unwrap(), &remote).await;
    let yarn = store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();
    let hat = store.add_project(ProjectInput::new("Hat")).await.unwrap();
    store.add_material_to_project(hat.id, yarn.id, 2.0).await.unwrap();
    let saved = store.snapshot();
    drop(store);

    let reopened = store_with(LocalDatabase::open(dir.path()).await.unwrap(), &remote).await;
    assert_eq!(reopened.snapshot(), saved);
}

#[tokio::test]
async fn test_open_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("deep").join("data");

    let db = LocalDatabase::open(&nested).await.unwrap();
    db.state().save(&AppState::default()).await;
    assert!(nested.join(DB_FILE).exists());
}

#[tokio::test]
async fn test_each_save_is_a_single_row() {
    let dir = TempDir::new().unwrap();
    let db = LocalDatabase::open(dir.path()).await.unwrap();
    db.state().save(&AppState::default()).await;
    db.state().save(&AppState::default()).await;

    let raw = raw_store(&dir).await;
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv WHERE key = ?")
        .bind(STATE_KEY)
        .fetch_one(raw.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_corrupt_row_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    raw_store(&dir).await.set(STATE_KEY, "{ this is not json").await.unwrap();

    let db = LocalDatabase::open(dir.path()).await.unwrap();
    assert_eq!(db.state().load().await, AppState::default());
}

#[tokio::test]
async fn test_invalid_document_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    raw_store(&dir)
        .await
        .set(STATE_KEY, r#"{"version": 2, "settings": {"currencySymbol": ""}}"#)
        .await
        .unwrap();

    let db = LocalDatabase::open(dir.path()).await.unwrap();
    assert_eq!(db.state().load().await, AppState::default());
}

#[tokio::test]
async fn test_legacy_key_is_moved_on_first_read() {
    let dir = TempDir::new().unwrap();
    let raw = raw_store(&dir).await;
    raw.set(
        LEGACY_STATE_KEY,
        r#"{"settings": {"currencySymbol": "£"}, "materials": [], "projects": []}"#,
    )
    .await
    .unwrap();

    let db = LocalDatabase::open(dir.path()).await.unwrap();
    let state = db.state().load().await;
    assert_eq!(state.settings.currency_symbol, "£");
    assert_eq!(state.settings.currency_code.as_deref(), Some("GBP"));
    assert!(raw.get(LEGACY_STATE_KEY).await.unwrap().is_none());
    assert!(raw.get(STATE_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn test_passphrase_never_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let db = LocalDatabase::open(dir.path()).await.unwrap();

    let mut workspace = WorkspaceInfo::new(Uuid::new_v4(), Some("tok".to_string()), None);
    workspace.passphrase = Some(PASSPHRASE.to_string());
    db.workspace().save_workspace(&workspace).await;
    assert_eq!(
        db.workspace().load_workspace().await.unwrap().passphrase.as_deref(),
        Some(PASSPHRASE)
    );

    // The main file and its WAL sidecars
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        let bytes = std::fs::read(entry.unwrap().path()).unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains(PASSPHRASE));
    }

    let reopened = LocalDatabase::open(dir.path()).await.unwrap();
    let cached = reopened.workspace().load_workspace().await.unwrap();
    assert_eq!(cached.id, workspace.id);
    assert_eq!(cached.passphrase, None);
}

#[tokio::test]
async fn test_durable_secret_store_keeps_edit_rights() {
    let dir = TempDir::new().unwrap();
    let secrets: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KeyValueStore> = Arc::new(raw_store(&dir).await);
    let db = LocalDatabase::with_stores(Arc::clone(&kv), Arc::clone(&secrets));

    let mut workspace = WorkspaceInfo::new(Uuid::new_v4(), None, None);
    workspace.passphrase = Some(PASSPHRASE.to_string());
    db.workspace().save_workspace(&workspace).await;
    drop(db);

    let reopened = LocalDatabase::with_stores(Arc::new(raw_store(&dir).await), secrets);
    let cached = reopened.workspace().load_workspace().await.unwrap();
    assert!(cached.can_edit());
    assert!(kv.get(WORKSPACE_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn test_clear_local_data_removes_rows() {
    let dir = TempDir::new().unwrap();
    let remote = MockRemote::new();
    let store = store_with(LocalDatabase::open(dir.path()).await.unwrap(), &remote).await;
    store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await.unwrap();

    store.reset_local_state().await;

    let raw = raw_store(&dir).await;
    assert!(raw.get(STATE_KEY).await.unwrap().is_none());
    assert!(raw.get(WORKSPACE_KEY).await.unwrap().is_none());
    assert_eq!(store.snapshot(), AppState::default());
}
