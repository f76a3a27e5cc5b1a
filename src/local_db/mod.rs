//! # Local Database Module
//!
//! Durable client-side storage for offline-first operation. Everything the
//! device knows survives restarts here: the serialized application state,
//! the bound workspace, sync metadata and the recent-visit history.
//!
//! ## Architecture
//!
//! Storage is a plain key-value abstraction ([`KeyValueStore`]) with two
//! backends:
//! - **`SqliteStore`**: a `kv` table in `local.db` under the data directory,
//!   opened in WAL mode
//! - **`MemoryStore`**: process-local map, used for the workspace secret
//!   (never written to disk) and in tests
//!
//! ## Key Components
//!
//! - `state.rs`: `AppState` load/save/export/import with validation
//! - `migration.rs`: schema migration of older document shapes
//! - `workspace.rs`: workspace binding, passphrase and sync metadata
//! - `history.rs`: recently visited workspaces
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pricecraft::local_db::LocalDatabase;
//!
//! # async fn example() -> pricecraft::shared::error::Result<()> {
//! let db = LocalDatabase::open("/tmp/pricecraft").await?;
//! let state = db.state().load().await;
//! db.state().save(&state).await;
//! # Ok(())
//! # }
//! ```

pub mod history;
pub mod migration;
pub mod state;
pub mod workspace;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{self, BoxFuture};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use crate::shared::error::Result;

pub use history::{VisitHistory, WorkspaceVisit};
pub use state::LocalStore;
pub use workspace::{SyncMeta, WorkspaceInfo, WorkspaceStore};

/// Database file created under the data directory
pub const DB_FILE: &str = "local.db";

/// Serialized `AppState`
pub const STATE_KEY: &str = "pricemycraft-app-state";
pub const LEGACY_STATE_KEY: &str = "crafty-app-state";
/// Workspace metadata, never including the passphrase
pub const WORKSPACE_KEY: &str = "pricemycraft-workspace";
pub const LEGACY_WORKSPACE_KEY: &str = "crafty-workspace";
/// Passphrase, kept in the secret store only
pub const PASSPHRASE_KEY: &str = "pricemycraft-workspace-passphrase";
pub const SYNC_META_KEY: &str = "pricemycraft-sync-meta";
pub const LEGACY_SYNC_META_KEY: &str = "crafty-sync-meta";
pub const HISTORY_KEY: &str = "pricemycraft-project-history";

const MAX_CONNECTIONS: u32 = 4;

/// Minimal string key-value storage
///
/// Methods return boxed futures so backends can be used as trait objects.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>>;
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Read `key`, moving data over from `legacy_key` first if only the legacy
/// key holds a value (copy, then delete).
pub async fn read_migrating(
    store: &dyn KeyValueStore,
    key: &str,
    legacy_key: &str,
) -> Result<Option<String>> {
    if let Some(value) = store.get(key).await? {
        return Ok(Some(value));
    }

    match store.get(legacy_key).await? {
        Some(legacy) => {
            tracing::info!("Migrating local data from legacy key {} to {}", legacy_key, key);
            store.set(key, &legacy).await?;
            store.remove(legacy_key).await?;
            Ok(Some(legacy))
        }
        None => Ok(None),
    }
}

/// In-process key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(future::ready(Ok(self.entries().get(key).cloned())))
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        self.entries().insert(key.to_string(), value.to_string());
        Box::pin(future::ready(Ok(())))
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        self.entries().remove(key);
        Box::pin(future::ready(Ok(())))
    }
}

/// Key-value store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at `path`
    ///
    /// Creates the parent directory and the `kv` table if missing. Uses WAL
    /// mode so a reader never waits on the writer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::query(include_str!("schema.sql")).execute(&pool).await?;

        tracing::debug!("Opened local database at {}", path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for open connections to finish and close them
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl KeyValueStore for SqliteStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(value)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO kv (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }
}

/// Local storage handle bundling every persisted concern of one device
#[derive(Clone)]
pub struct LocalDatabase {
    state: LocalStore,
    workspace: WorkspaceStore,
    history: VisitHistory,
}

impl LocalDatabase {
    /// Open `local.db` under `dir`; the passphrase lives only in memory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let kv = SqliteStore::open(dir.as_ref().join(DB_FILE)).await?;
        Ok(Self::with_stores(Arc::new(kv), Arc::new(MemoryStore::new())))
    }

    /// Fully in-memory database
    pub fn in_memory() -> Self {
        Self::with_stores(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Build on explicit stores: `kv` for durable data, `secrets` for the
    /// workspace passphrase.
    pub fn with_stores(kv: Arc<dyn KeyValueStore>, secrets: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: LocalStore::new(Arc::clone(&kv)),
            workspace: WorkspaceStore::new(Arc::clone(&kv), secrets),
            history: VisitHistory::new(kv),
        }
    }

    pub fn state(&self) -> &LocalStore {
        &self.state
    }

    pub fn workspace(&self) -> &WorkspaceStore {
        &self.workspace
    }

    pub fn history(&self) -> &VisitHistory {
        &self.history
    }

    /// Wipe everything this device stored
    pub async fn clear_local_data(&self) {
        self.state.clear().await;
        self.workspace.clear_workspace().await;
        self.workspace.clear_sync_meta().await;
        self.history.clear().await;
    }
}
