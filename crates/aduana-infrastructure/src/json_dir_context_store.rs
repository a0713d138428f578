//! Directory-backed context store.
//!
//! Durable variant of the context store for deployments whose session
//! contexts must survive a restart.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! ├── session-1/
//! │   ├── report_daily_dashboard.json
//! │   └── active_report_id_processes.json
//! └── session-2/
//!     └── …
//! ```
//!
//! Each file holds the context type's entries oldest-first; file writes are
//! whole-file replacements, so cross-process races remain last-write-wins.

use aduana_core::context::{ContextEntry, ContextStore, KeyFilter};
use aduana_core::error::{AduanaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-per-context-type `ContextStore` implementation.
pub struct JsonDirContextStore {
    base_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryDto {
    key: String,
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<Value>,
    updated_at: DateTime<Utc>,
}

impl From<EntryDto> for ContextEntry {
    fn from(dto: EntryDto) -> Self {
        Self {
            key: dto.key,
            value: dto.value,
            extra: dto.extra,
            updated_at: dto.updated_at,
        }
    }
}

impl JsonDirContextStore {
    /// Creates a store rooted at `base_dir`, creating the directory if
    /// needed.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| AduanaError::data_access(format!("create {base_dir:?}: {e}")))?;
        Ok(Self { base_dir })
    }

    /// Creates a store at the default location (`~/.local/share/aduana`).
    pub async fn default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| AduanaError::config("cannot determine data directory"))?
            .join("aduana")
            .join("contexts");
        Self::new(base).await
    }

    fn file_path(&self, session: &str, context_type: &str) -> PathBuf {
        self.base_dir
            .join(sanitize(session))
            .join(format!("{}.json", sanitize(context_type)))
    }

    async fn read_entries(&self, path: &Path) -> Result<Vec<EntryDto>> {
        match fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AduanaError::data_access(format!("read {path:?}: {e}"))),
        }
    }

    async fn write_entries(&self, path: &Path, entries: &[EntryDto]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AduanaError::data_access(format!("create {parent:?}: {e}")))?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(path, content)
            .await
            .map_err(|e| AduanaError::data_access(format!("write {path:?}: {e}")))
    }
}

/// Session ids and context types are internal identifiers, but they end up
/// as file names; anything outside a conservative set becomes `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl ContextStore for JsonDirContextStore {
    async fn set(
        &self,
        session: &str,
        context_type: &str,
        key: &str,
        value: Value,
        extra: Option<Value>,
    ) -> Result<()> {
        let path = self.file_path(session, context_type);
        let mut entries = self.read_entries(&path).await?;
        entries.retain(|e| e.key != key);
        entries.push(EntryDto {
            key: key.to_string(),
            value,
            extra,
            updated_at: Utc::now(),
        });
        self.write_entries(&path, &entries).await
    }

    async fn get(
        &self,
        session: &str,
        context_type: &str,
        filter: KeyFilter<'_>,
    ) -> Result<Vec<ContextEntry>> {
        let path = self.file_path(session, context_type);
        let entries = self.read_entries(&path).await?;
        Ok(entries
            .into_iter()
            .rev()
            .filter(|e| match filter {
                KeyFilter::Exact(key) => e.key == key,
                KeyFilter::All => true,
            })
            .map(ContextEntry::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirContextStore::new(dir.path()).await.unwrap();

        store
            .set("s1", "report_day_closing", "rpt-1", json!({"n": 1}), None)
            .await
            .unwrap();
        store
            .set("s1", "report_day_closing", "rpt-2", json!({"n": 2}), None)
            .await
            .unwrap();

        let entries = store
            .get("s1", "report_day_closing", KeyFilter::All)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "rpt-2");
        assert_eq!(entries[1].key, "rpt-1");
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirContextStore::new(dir.path()).await.unwrap();
        let entries = store.get("nobody", "report_custom", KeyFilter::All).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_key() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirContextStore::new(dir.path()).await.unwrap();
        store
            .set("s1", "active_report_id_sales", "current", json!("a"), None)
            .await
            .unwrap();
        store
            .set("s1", "active_report_id_sales", "current", json!("b"), None)
            .await
            .unwrap();
        let entries = store
            .get("s1", "active_report_id_sales", KeyFilter::Exact("current"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, json!("b"));
    }

    #[tokio::test]
    async fn test_awkward_session_names_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirContextStore::new(dir.path()).await.unwrap();
        store
            .set("user@host/chat", "report_custom", "rpt-1", json!(1), None)
            .await
            .unwrap();
        let entries = store
            .get("user@host/chat", "report_custom", KeyFilter::All)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
