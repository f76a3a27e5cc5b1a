//! Pricecraft - Main Library
//!
//! Pricecraft prices handmade projects: a library of materials and labor
//! rates, projects that consume them, and a suggested price per project.
//! Everything works offline against a local store; a device can optionally
//! bind to a shared workspace and keep it in sync.
//!
//! # Module Structure
//!
//! - **`shared`** - Domain model, pricing, validation, errors, configuration
//! - **`local_db`** - SQLite-backed key-value persistence for state,
//!   workspace binding, sync metadata and visit history
//! - **`remote`** - The `DataAccess` seam and its REST implementation
//! - **`sync`** - Workspace resolution, debounced pushes, pulls and status
//! - **`state`** - `CraftStore`, the observable facade the front end uses
//!
//! # Usage
//!
//! ```rust,no_run
//! use pricecraft::shared::AppConfig;
//! use pricecraft::state::{CraftStore, MaterialInput};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let store = CraftStore::open(&config).await?;
//! let yarn = store.add_material(MaterialInput::new("Yarn", 5.99, "skein")).await?;
//! println!("{} added", yarn.name);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! State lives in a `tokio::sync::watch` channel; sync bookkeeping uses
//! `Arc` with `RwLock`/`Mutex` and an atomic in-flight flag. Mutations take
//! an async writer lock until their state is saved, so a `CraftStore` can be
//! shared across tasks.

/// Shared types and data structures
pub mod shared;

/// Local persistence
pub mod local_db;

/// Remote workspace service access
pub mod remote;

/// Workspace sync
pub mod sync;

/// Observable application state
pub mod state;
