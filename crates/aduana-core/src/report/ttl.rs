//! Per-kind freshness windows.
//!
//! TTL values differ by report kind and are configuration, not constants:
//! the defaults below are the in-code fallback, the deployed values come
//! from `config.toml` (see the infrastructure config service).

use super::model::ReportKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Fallback window for kinds without an explicit entry.
pub const DEFAULT_TTL_MIN: i64 = 60;

/// Per-kind TTL table, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlConfig {
    /// Kind string → freshness window in minutes.
    #[serde(default)]
    pub per_kind: BTreeMap<String, i64>,
    #[serde(default = "default_ttl_min")]
    pub default_min: i64,
}

fn default_ttl_min() -> i64 {
    DEFAULT_TTL_MIN
}

impl Default for TtlConfig {
    fn default() -> Self {
        let mut per_kind = BTreeMap::new();
        per_kind.insert(ReportKind::DailyDashboard.to_string(), 30);
        per_kind.insert(ReportKind::DayClosing.to_string(), 120);
        per_kind.insert(ReportKind::SalesByInvoice.to_string(), 60);
        per_kind.insert(ReportKind::SalesAbc.to_string(), 60);
        per_kind.insert(ReportKind::LegislationLookup.to_string(), 240);
        Self {
            per_kind,
            default_min: DEFAULT_TTL_MIN,
        }
    }
}

impl TtlConfig {
    /// Returns the freshness window for a kind.
    ///
    /// TTL must be a positive integer; a non-positive configured value is a
    /// deviation and falls back to the default with a logged warning.
    pub fn ttl_for(&self, kind: &ReportKind) -> i64 {
        let configured = self
            .per_kind
            .get(&kind.to_string())
            .copied()
            .unwrap_or(self.default_min);
        if configured > 0 {
            configured
        } else {
            warn!(
                kind = %kind,
                configured,
                "non-positive TTL configured, using default"
            );
            DEFAULT_TTL_MIN
        }
    }
}
