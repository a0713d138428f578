//! Report domain model.
//!
//! This module contains the core Report entity: an ephemeral, AI-generated
//! report (dashboard, financial statement, sales extract) that is rendered
//! once and then re-used for follow-up requests without re-querying the
//! original data source.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// The kind of a report. Drives TTL defaults, domain inference and
/// rendering conventions.
///
/// Producers are free to mint new kind strings; anything outside the known
/// set is carried verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ReportKind {
    #[strum(serialize = "daily_dashboard")]
    DailyDashboard,
    #[strum(serialize = "day_closing")]
    DayClosing,
    #[strum(serialize = "sales_by_invoice")]
    SalesByInvoice,
    #[strum(serialize = "sales_abc")]
    SalesAbc,
    #[strum(serialize = "legislation_lookup")]
    LegislationLookup,
    #[strum(default, to_string = "{0}")]
    Other(String),
}

impl ReportKind {
    /// The enumerable kinds the store can scan for history lookups.
    /// `Other` kinds are filed under a shared custom bucket instead.
    pub fn known() -> [ReportKind; 5] {
        [
            ReportKind::DailyDashboard,
            ReportKind::DayClosing,
            ReportKind::SalesByInvoice,
            ReportKind::SalesAbc,
            ReportKind::LegislationLookup,
        ]
    }
}

impl From<ReportKind> for String {
    fn from(kind: ReportKind) -> String {
        kind.to_string()
    }
}

impl From<String> for ReportKind {
    fn from(s: String) -> Self {
        // EnumString with a default variant never fails
        ReportKind::from_str(&s).unwrap_or(ReportKind::Other(s))
    }
}

/// A non-overlapping partition of report pointers.
///
/// Each session holds independent active/last-visible pointers per domain,
/// so a banking statement never shadows a customs-process dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Processes,
    Finance,
    Sales,
}

/// Parent pointer from a derived report back to its base report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// Id of the report this one was derived from.
    pub base_id: String,
}

/// What a report-generating tool supplies (producer contract).
///
/// `save` mints the identity fields; the producer only chooses a stable
/// `kind` string so later TTL/domain lookups work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub kind: ReportKind,
    pub rendered_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub filters_applied: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ReportDraft {
    pub fn new(kind: ReportKind, rendered_text: impl Into<String>) -> Self {
        Self {
            kind,
            rendered_text: rendered_text.into(),
            category: None,
            filters_applied: Map::new(),
            payload: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_filters(mut self, filters: Map<String, Value>) -> Self {
        self.filters_applied = filters;
        self
    }
}

/// A stored report. Immutable once created; follow-up operations produce a
/// new `Report` whose `lineage` points back here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Opaque, time-derived id, unique within a session.
    pub id: String,
    pub kind: ReportKind,
    /// Optional free-form tag, e.g. a client-category code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The exact human-facing text previously shown to the user,
    /// including the embedded identity tag.
    pub rendered_text: String,
    /// Structured sections consumed by the filter/grouping/query engines.
    /// Absent payload degrades the report to display-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Filters already baked into this report (provenance only).
    #[serde(default)]
    pub filters_applied: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    /// Freshness window in minutes, always positive.
    pub ttl_min: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
}

impl Report {
    /// A report is fresh while `now - created_at <= ttl_min` minutes.
    /// The boundary minute is still fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) <= Duration::minutes(self.ttl_min)
    }

    /// Whole minutes elapsed since creation.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_minutes()
    }

    pub fn base_id(&self) -> Option<&str> {
        self.lineage.as_ref().map(|l| l.base_id.as_str())
    }

    /// True when this report was produced by a filter/classify operation.
    pub fn is_derived(&self) -> bool {
        self.lineage.is_some()
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id.clone(),
            kind: self.kind.clone(),
            created_at: self.created_at,
            ttl_min: self.ttl_min,
        }
    }
}

/// Lightweight report metadata for history and disambiguation UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub kind: ReportKind,
    pub created_at: DateTime<Utc>,
    pub ttl_min: i64,
}

/// Result of the `pick` decision procedure (consumer contract).
///
/// Never thrown: stale, missing and ambiguous conditions are all encoded
/// here so the chat layer can prompt the user instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickOutcome {
    /// The resolved report, when the pick succeeded.
    pub report: Option<Report>,
    /// Id of the domain's active report, when one was consulted.
    pub active_id: Option<String>,
    /// The caller must ask the producer to regenerate.
    pub needs_refresh: bool,
    /// Multiple fresh candidates; the caller must surface `candidates`.
    pub ambiguous: bool,
    pub candidates: Vec<Candidate>,
}

impl PickOutcome {
    pub fn found(report: Report) -> Self {
        Self {
            active_id: Some(report.id.clone()),
            report: Some(report),
            needs_refresh: false,
            ambiguous: false,
            candidates: Vec::new(),
        }
    }

    pub fn refresh_required() -> Self {
        Self {
            report: None,
            active_id: None,
            needs_refresh: true,
            ambiguous: false,
            candidates: Vec::new(),
        }
    }

    pub fn ambiguous_between(candidates: Vec<Candidate>) -> Self {
        Self {
            report: None,
            active_id: None,
            needs_refresh: false,
            ambiguous: true,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_string() {
        let kind = ReportKind::DayClosing;
        let s: String = kind.clone().into();
        assert_eq!(s, "day_closing");
        assert_eq!(ReportKind::from(s), kind);
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let kind = ReportKind::from("storage_costs".to_string());
        assert_eq!(kind, ReportKind::Other("storage_costs".to_string()));
        assert_eq!(kind.to_string(), "storage_costs");
    }

    #[test]
    fn test_freshness_boundary_is_exact() {
        let now = Utc::now();
        let report = Report {
            id: "rpt-1".to_string(),
            kind: ReportKind::DailyDashboard,
            category: None,
            rendered_text: String::new(),
            payload: None,
            filters_applied: Map::new(),
            created_at: now - Duration::minutes(30),
            ttl_min: 30,
            lineage: None,
        };
        // exactly at the TTL boundary: fresh
        assert!(report.is_fresh(now));
        // one minute past: stale
        assert!(!report.is_fresh(now + Duration::minutes(1)));
    }

    #[test]
    fn test_domain_serializes_lowercase() {
        let s = serde_json::to_string(&Domain::Finance).unwrap();
        assert_eq!(s, "\"finance\"");
        assert_eq!(Domain::Finance.to_string(), "finance");
    }
}
