//! Session context-store contract.
//!
//! The persistent key-value session-context store is an external
//! collaborator; this module defines the trait the report layer consumes
//! plus the context-type key scheme it relies on. Implementations live in
//! `aduana-infrastructure`.

use crate::error::Result;
use crate::report::{Domain, ReportKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fixed key under which pointer records are stored.
pub const POINTER_KEY: &str = "current";

/// Context type for report bodies of a kind; `Other` kinds share one
/// custom bucket so history scans stay enumerable.
pub fn report_context_type(kind: &ReportKind) -> String {
    match kind {
        ReportKind::Other(_) => "report_custom".to_string(),
        known => format!("report_{}", known),
    }
}

/// Context type for a domain's active-report pointer.
pub fn active_pointer_type(domain: Domain) -> String {
    format!("active_report_id_{}", domain)
}

/// Context type for a domain's last-visible-report pointer.
pub fn last_visible_pointer_type(domain: Domain) -> String {
    format!("last_visible_report_id_{}", domain)
}

/// One stored entry, as returned by `ContextStore::get`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub key: String,
    pub value: Value,
    pub extra: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

/// Key selector for `ContextStore::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFilter<'a> {
    /// Entries with exactly this key.
    Exact(&'a str),
    /// All keys of the context type.
    All,
}

/// An abstract per-session key-value context store.
///
/// Writes to an existing `(session, context_type, key)` triple are
/// last-write-wins with no locking or transaction boundary; concurrent
/// saves for the same session can race and one update may be silently
/// lost. Callers must not invoke operations concurrently for one session.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Stores a value under `(session, context_type, key)`.
    async fn set(
        &self,
        session: &str,
        context_type: &str,
        key: &str,
        value: Value,
        extra: Option<Value>,
    ) -> Result<()>;

    /// Retrieves entries for a context type, ordered by recency descending.
    async fn get(
        &self,
        session: &str,
        context_type: &str,
        filter: KeyFilter<'_>,
    ) -> Result<Vec<ContextEntry>>;
}
