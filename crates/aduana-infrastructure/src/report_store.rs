//! Typed report and pointer persistence over the context store.
//!
//! Reports are stored under a type-indexed context type
//! (`report_<kind>`), pointer records under
//! `active_report_id_<domain>` / `last_visible_report_id_<domain>` with the
//! fixed key `current`. Pointer records carry `{report_id, kind}` so the
//! pointed report is fetched directly instead of scanned for.

use aduana_core::context::{
    ContextStore, KeyFilter, POINTER_KEY, active_pointer_type, last_visible_pointer_type,
    report_context_type,
};
use aduana_core::error::Result;
use aduana_core::report::{Domain, Report, ReportKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointerRecord {
    report_id: String,
    kind: ReportKind,
}

/// Typed facade over the session context store.
#[derive(Clone)]
pub struct ReportStore {
    store: Arc<dyn ContextStore>,
}

impl ReportStore {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }

    /// Persists a report body under its type-indexed key.
    pub async fn save_report(&self, session: &str, report: &Report) -> Result<()> {
        let context_type = report_context_type(&report.kind);
        let value = serde_json::to_value(report)?;
        self.store
            .set(session, &context_type, &report.id, value, None)
            .await
    }

    /// Loads the stored reports of one kind, newest first.
    pub async fn load_by_kind(&self, session: &str, kind: &ReportKind) -> Result<Vec<Report>> {
        let context_type = report_context_type(kind);
        let mut reports = self.load_context_type(session, &context_type).await?;
        // the shared custom bucket holds several kinds
        reports.retain(|r| &r.kind == kind);
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    /// Loads every stored report across the enumerable kinds plus the
    /// custom bucket, newest first.
    pub async fn load_all(&self, session: &str) -> Result<Vec<Report>> {
        let mut reports = Vec::new();
        for kind in ReportKind::known() {
            let context_type = report_context_type(&kind);
            reports.extend(self.load_context_type(session, &context_type).await?);
        }
        reports.extend(self.load_context_type(session, "report_custom").await?);
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn load_context_type(&self, session: &str, context_type: &str) -> Result<Vec<Report>> {
        let entries = self.store.get(session, context_type, KeyFilter::All).await?;
        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Report>(entry.value) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    // tolerate legacy rows that no longer deserialize
                    warn!(context_type, key = %entry.key, error = %e, "skipping unreadable report row");
                }
            }
        }
        Ok(reports)
    }

    /// Points the domain's active report at `report`.
    pub async fn set_active(&self, session: &str, domain: Domain, report: &Report) -> Result<()> {
        self.write_pointer(session, &active_pointer_type(domain), report)
            .await
    }

    /// Points the domain's last-visible report at `report`.
    pub async fn set_last_visible(
        &self,
        session: &str,
        domain: Domain,
        report: &Report,
    ) -> Result<()> {
        self.write_pointer(session, &last_visible_pointer_type(domain), report)
            .await
    }

    async fn write_pointer(&self, session: &str, context_type: &str, report: &Report) -> Result<()> {
        let record = PointerRecord {
            report_id: report.id.clone(),
            kind: report.kind.clone(),
        };
        self.store
            .set(
                session,
                context_type,
                POINTER_KEY,
                serde_json::to_value(&record)?,
                None,
            )
            .await
    }

    /// Resolves the domain's active report, if the pointer and the pointed
    /// report both still exist. Stale pointers resolve to `None`.
    pub async fn active_report(&self, session: &str, domain: Domain) -> Result<Option<Report>> {
        self.read_pointer(session, &active_pointer_type(domain)).await
    }

    /// Resolves the domain's last-visible report.
    pub async fn last_visible_report(
        &self,
        session: &str,
        domain: Domain,
    ) -> Result<Option<Report>> {
        self.read_pointer(session, &last_visible_pointer_type(domain))
            .await
    }

    async fn read_pointer(&self, session: &str, context_type: &str) -> Result<Option<Report>> {
        let entries = self
            .store
            .get(session, context_type, KeyFilter::Exact(POINTER_KEY))
            .await?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let record: PointerRecord = match serde_json::from_value(entry.value) {
            Ok(record) => record,
            Err(e) => {
                warn!(context_type, error = %e, "unreadable pointer record");
                return Ok(None);
            }
        };

        let report_type = report_context_type(&record.kind);
        let mut bodies = self
            .store
            .get(session, &report_type, KeyFilter::Exact(&record.report_id))
            .await?;
        let Some(body) = bodies.pop() else {
            // pointer staleness is tolerated, not hard-enforced
            return Ok(None);
        };
        Ok(serde_json::from_value(body.value).ok())
    }
}
