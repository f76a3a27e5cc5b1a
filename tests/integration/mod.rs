//! Integration tests
//!
//! End-to-end behavior of the store, the sync manager and the REST client.

mod local_store;
mod rest_remote;
mod sync_manager;
mod workspace_flow;
