//! Report lifecycle management.
//!
//! `ReportLifecycleManager` owns report identity, the per-domain
//! active/last-visible pointers and the pick decision procedure. Reports
//! are immutable once saved; follow-up operations persist derivatives with
//! lineage back to the base.

use aduana_core::error::{AduanaError, Result};
use aduana_core::intent::{detect_domain, detect_kind, domain_for_kind};
use aduana_core::normalizer;
use aduana_core::report::{
    Candidate, Lineage, PickOutcome, Report, ReportDraft, TtlConfig, ensure_tag, parse_tag,
};
use aduana_infrastructure::ReportStore;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Manages report identity, pointers, TTL freshness and ambiguity
/// resolution for one context store.
pub struct ReportLifecycleManager {
    store: ReportStore,
    ttl: TtlConfig,
}

impl ReportLifecycleManager {
    pub fn new(store: ReportStore, ttl: TtlConfig) -> Self {
        Self { store, ttl }
    }

    /// Saves a freshly generated report (producer contract).
    ///
    /// Normalizes the payload, mints the identity, appends the inline
    /// identity tag and unconditionally refreshes the domain's active and
    /// last-visible pointers. Pointer overwrite is last-write-wins.
    pub async fn save(&self, session: &str, draft: ReportDraft) -> Result<Report> {
        self.persist(session, draft, None).await
    }

    /// Saves a report derived from `base` by a filter/classify operation.
    ///
    /// Sets `lineage.base_id` and refreshes only the last-visible pointer:
    /// a derivative is what the user now sees, but the domain's active
    /// generation stays the base.
    pub async fn save_derived(
        &self,
        session: &str,
        draft: ReportDraft,
        base: &Report,
    ) -> Result<Report> {
        self.persist(session, draft, Some(base)).await
    }

    async fn persist(
        &self,
        session: &str,
        mut draft: ReportDraft,
        base: Option<&Report>,
    ) -> Result<Report> {
        if let Some(payload) = draft.payload.as_mut() {
            normalizer::normalize(payload, draft.category.as_deref());
        }

        let now = Utc::now();
        let mut report = Report {
            id: mint_id(now),
            kind: draft.kind,
            category: draft.category,
            rendered_text: draft.rendered_text,
            payload: draft.payload,
            filters_applied: draft.filters_applied,
            created_at: now,
            ttl_min: 0,
            lineage: base.map(|b| Lineage {
                base_id: b.id.clone(),
            }),
        };
        report.ttl_min = self.ttl.ttl_for(&report.kind);
        report.rendered_text = ensure_tag(&report.rendered_text, &report);

        self.store.save_report(session, &report).await?;

        let domain = domain_for_kind(&report.kind);
        if base.is_none() {
            self.store.set_active(session, domain, &report).await?;
        }
        self.store.set_last_visible(session, domain, &report).await?;

        debug!(
            session,
            id = %report.id,
            kind = %report.kind,
            domain = %domain,
            derived = base.is_some(),
            "report saved"
        );
        Ok(report)
    }

    /// Finds a report by the identity tag embedded in its rendered text.
    ///
    /// Intentionally tolerant of legacy rows whose only identity is the
    /// inline tag; rows carrying a matching id field are accepted too.
    pub async fn find_by_id(&self, session: &str, id: &str) -> Result<Report> {
        let reports = self.store.load_all(session).await?;
        reports
            .into_iter()
            .find(|r| {
                parse_tag(&r.rendered_text)
                    .map(|meta| meta.id == id)
                    .unwrap_or(false)
                    || r.id == id
            })
            .ok_or_else(|| AduanaError::not_found("report", id))
    }

    /// The `limit` most recent reports' metadata, newest first.
    pub async fn history(&self, session: &str, limit: usize) -> Result<Vec<Candidate>> {
        let reports = self.store.load_all(session).await?;
        Ok(reports
            .into_iter()
            .take(limit)
            .map(|r| r.candidate())
            .collect())
    }

    /// Moves the domain's last-visible pointer to an already stored
    /// report, for when the rendering layer re-shows an older one.
    pub async fn mark_visible(&self, session: &str, report_id: &str) -> Result<Report> {
        let report = self.find_by_id(session, report_id).await?;
        let domain = domain_for_kind(&report.kind);
        self.store
            .set_last_visible(session, domain, &report)
            .await?;
        Ok(report)
    }

    /// Resolves which report a follow-up message refers to.
    ///
    /// Precedence: an explicitly named kind always wins over the domain's
    /// implicit active pointer, and both win over open-ended
    /// disambiguation. Stale or missing candidates come back as
    /// `needs_refresh`; multiple fresh candidates as `ambiguous`. Never an
    /// error.
    pub async fn pick(&self, session: &str, message: &str) -> Result<PickOutcome> {
        let now = Utc::now();

        // 1. explicit kind mention
        if let Some(kind) = detect_kind(message) {
            let reports = self.store.load_by_kind(session, &kind).await?;
            return Ok(match reports.into_iter().next() {
                Some(report) if report.is_fresh(now) => PickOutcome::found(report),
                // found but stale, or not found at all
                _ => PickOutcome::refresh_required(),
            });
        }

        // 2. the domain's active pointer
        let domain = detect_domain(message);
        if let Some(active) = self.store.active_report(session, domain).await? {
            if active.is_fresh(now) {
                return Ok(PickOutcome::found(active));
            }
        }

        // 3. open-ended: every fresh report in history
        let mut fresh: Vec<Report> = self
            .store
            .load_all(session)
            .await?
            .into_iter()
            .filter(|r| r.is_fresh(now))
            .collect();
        Ok(if fresh.is_empty() {
            PickOutcome::refresh_required()
        } else if fresh.len() == 1 {
            PickOutcome::found(fresh.remove(0))
        } else {
            PickOutcome::ambiguous_between(fresh.iter().map(Report::candidate).collect())
        })
    }
}

/// Time-derived id, unique within a session: a sortable timestamp prefix
/// plus a short random suffix for same-millisecond saves.
fn mint_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "rpt-{}-{}",
        now.format("%Y%m%d%H%M%S%3f"),
        &suffix[..4]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aduana_core::report::ReportKind;
    use aduana_infrastructure::MemoryContextStore;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> ReportLifecycleManager {
        let store = ReportStore::new(Arc::new(MemoryContextStore::new()));
        ReportLifecycleManager::new(store, TtlConfig::default())
    }

    fn dashboard_draft() -> ReportDraft {
        ReportDraft::new(ReportKind::DailyDashboard, "## Dashboard\n3 open processes")
            .with_payload(json!({
                "sections": {
                    "review_queue": [
                        {"processo": "DMD.0001/26", "channel": "green"}
                    ]
                }
            }))
    }

    #[tokio::test]
    async fn test_save_mints_identity_and_normalizes() {
        let manager = manager();
        let report = manager.save("s1", dashboard_draft()).await.unwrap();

        assert!(report.id.starts_with("rpt-"));
        assert_eq!(report.ttl_min, 30);
        assert!(report.rendered_text.contains("[REPORT_META:"));
        // payload was normalized on the way in
        let rows = &report.payload.as_ref().unwrap()["sections"]["review_queue"];
        assert_eq!(rows[0]["item_reference"], "DMD.0001/26");
        assert_eq!(rows[0]["category"], "DMD");
    }

    #[tokio::test]
    async fn test_find_by_id_uses_the_embedded_tag() {
        let manager = manager();
        let saved = manager.save("s1", dashboard_draft()).await.unwrap();
        let found = manager.find_by_id("s1", &saved.id).await.unwrap();
        assert_eq!(found.id, saved.id);

        let missing = manager.find_by_id("s1", "rpt-nope").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let manager = manager();
        manager.save("s1", dashboard_draft()).await.unwrap();
        let second = manager
            .save(
                "s1",
                ReportDraft::new(ReportKind::DayClosing, "## Closing"),
            )
            .await
            .unwrap();

        let history = manager.history("s1", 1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, second.id);
    }

    #[tokio::test]
    async fn test_pick_explicit_kind_mismatch_needs_refresh() {
        let manager = manager();
        // only a dashboard exists, well within TTL
        manager.save("s1", dashboard_draft()).await.unwrap();

        let outcome = manager
            .pick("s1", "send the closing report")
            .await
            .unwrap();
        assert!(outcome.needs_refresh);
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn test_pick_prefers_the_domain_pointer() {
        let manager = manager();
        manager.save("s1", dashboard_draft()).await.unwrap();
        let closing = manager
            .save(
                "s1",
                ReportDraft::new(ReportKind::DayClosing, "## Closing"),
            )
            .await
            .unwrap();

        // bank wording resolves to the finance domain's active report
        let outcome = manager.pick("s1", "email the bank summary").await.unwrap();
        assert_eq!(outcome.report.map(|r| r.id), Some(closing.id));
    }

    #[tokio::test]
    async fn test_derived_save_keeps_active_pointer_on_base() {
        let manager = manager();
        let base = manager.save("s1", dashboard_draft()).await.unwrap();
        let derived = manager
            .save_derived(
                "s1",
                ReportDraft::new(ReportKind::DailyDashboard, "## Filtered"),
                &base,
            )
            .await
            .unwrap();

        assert_eq!(derived.base_id(), Some(base.id.as_str()));
        // a neutral message still resolves to the base via the active pointer
        let outcome = manager.pick("s1", "send it again").await.unwrap();
        assert_eq!(outcome.report.map(|r| r.id), Some(base.id));
    }

    #[tokio::test]
    async fn test_mark_visible_moves_only_the_visible_pointer() {
        let manager = manager();
        let first = manager.save("s1", dashboard_draft()).await.unwrap();
        let second = manager.save("s1", dashboard_draft()).await.unwrap();

        manager.mark_visible("s1", &first.id).await.unwrap();

        // active still points at the most recent save
        let outcome = manager.pick("s1", "resend it").await.unwrap();
        assert_eq!(outcome.report.map(|r| r.id), Some(second.id));
    }
}
