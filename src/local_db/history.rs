//! Recently visited workspaces, most recent first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{KeyValueStore, HISTORY_KEY};

/// Entries kept after each visit
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceVisit {
    pub id: Uuid,
    pub url: String,
    /// Epoch milliseconds
    pub visited_at: i64,
}

#[derive(Clone)]
pub struct VisitHistory {
    kv: Arc<dyn KeyValueStore>,
}

impl VisitHistory {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored visits; malformed entries are skipped
    pub async fn load(&self) -> Vec<WorkspaceVisit> {
        let raw = match self.kv.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read visit history: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub async fn save(&self, visits: &[WorkspaceVisit]) {
        let result = match serde_json::to_string(visits) {
            Ok(json) => self.kv.set(HISTORY_KEY, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to save visit history: {}", e);
        }
    }

    /// Put a visit at the front, dropping older entries for the same
    /// workspace or URL
    pub async fn record_visit(&self, id: Uuid, url: &str) -> Vec<WorkspaceVisit> {
        let mut visits = self.load().await;
        visits.retain(|v| v.id != id && v.url != url);
        visits.insert(
            0,
            WorkspaceVisit {
                id,
                url: url.to_string(),
                visited_at: chrono::Utc::now().timestamp_millis(),
            },
        );
        visits.truncate(MAX_HISTORY);
        self.save(&visits).await;
        visits
    }

    pub async fn clear(&self) {
        if let Err(e) = self.kv.remove(HISTORY_KEY).await {
            tracing::warn!("Failed to clear visit history: {}", e);
        }
    }
}
