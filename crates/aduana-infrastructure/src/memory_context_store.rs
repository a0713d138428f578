//! In-memory context store.
//!
//! The default store for session-scoped deployments and the backing store
//! for tests. Entries live per `(session, context_type)`; writing an
//! existing key replaces it (last-write-wins, no locking beyond the map
//! lock; see the `ContextStore` contract).

use aduana_core::context::{ContextEntry, ContextStore, KeyFilter};
use aduana_core::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory `ContextStore` implementation.
#[derive(Default)]
pub struct MemoryContextStore {
    /// (session, context_type) → entries, oldest first. Position is the
    /// recency order; `get` reads back newest first.
    entries: RwLock<HashMap<(String, String), Vec<ContextEntry>>>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn set(
        &self,
        session: &str,
        context_type: &str,
        key: &str,
        value: Value,
        extra: Option<Value>,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        let bucket = entries
            .entry((session.to_string(), context_type.to_string()))
            .or_default();
        bucket.retain(|e| e.key != key);
        bucket.push(ContextEntry {
            key: key.to_string(),
            value,
            extra,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn get(
        &self,
        session: &str,
        context_type: &str,
        filter: KeyFilter<'_>,
    ) -> Result<Vec<ContextEntry>> {
        let entries = self.entries.read().await;
        let bucket = entries.get(&(session.to_string(), context_type.to_string()));
        let Some(bucket) = bucket else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .iter()
            .rev()
            .filter(|e| match filter {
                KeyFilter::Exact(key) => e.key == key,
                KeyFilter::All => true,
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get_exact_key() {
        let store = MemoryContextStore::new();
        store
            .set("s1", "report_daily_dashboard", "rpt-1", json!({"a": 1}), None)
            .await
            .unwrap();

        let entries = store
            .get("s1", "report_daily_dashboard", KeyFilter::Exact("rpt-1"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_get_all_is_recency_descending() {
        let store = MemoryContextStore::new();
        for i in 0..3 {
            store
                .set("s1", "report_custom", &format!("rpt-{i}"), json!(i), None)
                .await
                .unwrap();
        }
        let entries = store.get("s1", "report_custom", KeyFilter::All).await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["rpt-2", "rpt-1", "rpt-0"]);
    }

    #[tokio::test]
    async fn test_same_key_is_last_write_wins() {
        let store = MemoryContextStore::new();
        store
            .set("s1", "active_report_id_processes", "current", json!("old"), None)
            .await
            .unwrap();
        store
            .set("s1", "active_report_id_processes", "current", json!("new"), None)
            .await
            .unwrap();

        let entries = store
            .get("s1", "active_report_id_processes", KeyFilter::Exact("current"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, json!("new"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryContextStore::new();
        store
            .set("s1", "report_custom", "rpt-1", json!(1), None)
            .await
            .unwrap();
        let other = store.get("s2", "report_custom", KeyFilter::All).await.unwrap();
        assert!(other.is_empty());
    }
}
