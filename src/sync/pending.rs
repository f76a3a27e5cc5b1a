//! # Pending Changes
//!
//! Bookkeeping of local mutations made since the last successful push.
//!
//! Pushes always send the whole current state, so this queue never decides
//! what goes over the wire. It tells observers how much unsynced work there
//! is. A successful push clears the changes recorded before it started;
//! anything recorded while it was in flight stays pending.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of mutation recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A recorded, not yet pushed, mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: Uuid,
    /// Position in the log; increases with every recorded change
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Collection the change touched (`materials`, `projects`, ...)
    pub table: String,
    pub data: Value,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Queue of pending changes, oldest first
#[derive(Debug, Default)]
pub struct PendingChanges {
    changes: RwLock<VecDeque<PendingChange>>,
    last_sequence: AtomicU64,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change and return its id
    pub fn push(&self, kind: ChangeKind, table: impl Into<String>, data: Value) -> Uuid {
        let change = PendingChange {
            id: Uuid::new_v4(),
            sequence: self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1,
            kind,
            table: table.into(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let id = change.id;
        tracing::trace!("Queued {:?} on {}", kind, change.table);

        self.changes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(change);
        id
    }

    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.changes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.changes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending changes touching `table`
    pub fn count_for(&self, table: &str) -> usize {
        self.changes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.table == table)
            .count()
    }

    /// Sequence of the most recently recorded change (0 before any)
    pub fn watermark(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    /// Drop changes recorded up to and including `watermark`; returns how
    /// many remain
    pub fn clear_through(&self, watermark: u64) -> usize {
        let mut changes = self.changes.write().unwrap_or_else(PoisonError::into_inner);
        changes.retain(|c| c.sequence > watermark);
        changes.len()
    }

    pub fn clear(&self) {
        self.changes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
