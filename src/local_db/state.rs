//! # Application State Storage
//!
//! Persists the [`AppState`] aggregate under a single key.
//!
//! ## Failure policy
//!
//! - `load` never fails: missing, unparsable or invalid data yields the
//!   default state (validation issues are logged, never half-applied)
//! - `save` never fails: write errors are logged, in-memory state stays
//!   authoritative
//! - `import` is the one place validation errors reach the user, as a
//!   per-field list

use std::sync::Arc;

use serde_json::Value;

use super::migration::migrate;
use super::{read_migrating, KeyValueStore, LEGACY_STATE_KEY, STATE_KEY};
use crate::shared::error::Result;
use crate::shared::models::AppState;
use crate::shared::validation::{validate_value, ValidationErrors, ValidationIssue, ValidationResult};

/// Parse, migrate and validate a serialized state document
pub fn parse_document(text: &str) -> ValidationResult {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        ValidationErrors(vec![ValidationIssue::new("", format!("Invalid JSON: {}", e))])
    })?;
    parse_value(value)
}

/// Migrate and validate an already-parsed state document
pub fn parse_value(value: Value) -> ValidationResult {
    validate_value(&migrate(value))
}

/// Serialized application state in a key-value store
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the persisted state, falling back to defaults
    pub async fn load(&self) -> AppState {
        let raw = match read_migrating(self.kv.as_ref(), STATE_KEY, LEGACY_STATE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return AppState::default(),
            Err(e) => {
                tracing::warn!("Failed to read local state: {}", e);
                return AppState::default();
            }
        };

        match parse_document(&raw) {
            Ok(state) => state,
            Err(errors) => {
                tracing::warn!(
                    "Stored state failed validation, using defaults ({} issues)",
                    errors.issues().len()
                );
                for issue in errors.issues() {
                    tracing::warn!("  {}", issue);
                }
                AppState::default()
            }
        }
    }

    /// Overwrite the persisted state
    pub async fn save(&self, state: &AppState) {
        if let Err(e) = self.try_save(state).await {
            tracing::warn!("Failed to save local state: {}", e);
        }
    }

    async fn try_save(&self, state: &AppState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.kv.set(STATE_KEY, &json).await
    }

    /// Remove the persisted state, including any legacy copy
    pub async fn clear(&self) {
        for key in [STATE_KEY, LEGACY_STATE_KEY] {
            if let Err(e) = self.kv.remove(key).await {
                tracing::warn!("Failed to remove {}: {}", key, e);
            }
        }
    }

    /// Pretty-printed JSON backup of `state`
    pub fn export(state: &AppState) -> Result<String> {
        Ok(serde_json::to_string_pretty(state)?)
    }

    /// Parse a user-supplied backup, migrating older formats
    pub fn import(json: &str) -> ValidationResult {
        parse_document(json)
    }
}
