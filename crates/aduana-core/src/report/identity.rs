//! Inline identity tag protocol.
//!
//! Report identity survives round-trips through the chat transcript via a
//! sentinel tag appended to the rendered text:
//!
//! ```text
//! [REPORT_META:{"id":"…","created_at":"…","ttl_min":30,"filtrado":false,"base_id":null}]
//! ```
//!
//! The tag is legacy wire format: key names (including `filtrado`) must not
//! change. Lifecycle operations also return the id as an explicit field, so
//! the tag is only a fallback for rows that lost their side-channel id.

use super::model::Report;
use crate::util::first_json_object;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal prefix the tag is located by.
pub const META_PREFIX: &str = "[REPORT_META:";

/// The identity payload embedded in `rendered_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub ttl_min: i64,
    /// Legacy key: true when the report is a filtered derivative.
    #[serde(rename = "filtrado")]
    pub filtered: bool,
    #[serde(default)]
    pub base_id: Option<String>,
}

impl ReportMeta {
    pub fn for_report(report: &Report) -> Self {
        Self {
            id: report.id.clone(),
            created_at: report.created_at,
            ttl_min: report.ttl_min,
            filtered: report.lineage.is_some(),
            base_id: report.base_id().map(str::to_string),
        }
    }
}

/// Renders the identity tag for a report.
pub fn render_tag(report: &Report) -> String {
    let meta = ReportMeta::for_report(report);
    // ReportMeta serialization cannot fail: plain fields, no maps
    let json = serde_json::to_string(&meta).unwrap_or_default();
    format!("{}{}]", META_PREFIX, json)
}

/// Appends the identity tag to a rendered text, unless one is present.
pub fn ensure_tag(rendered_text: &str, report: &Report) -> String {
    if rendered_text.contains(META_PREFIX) {
        return rendered_text.to_string();
    }
    format!("{}\n\n{}", rendered_text.trim_end(), render_tag(report))
}

/// Locates and parses the identity tag in a rendered text.
///
/// Finds the literal prefix, then the first top-level JSON object after it.
/// Absent or malformed tags yield `None`; legacy rows without a tag are
/// resolved by positional recency instead.
pub fn parse_tag(text: &str) -> Option<ReportMeta> {
    let at = text.find(META_PREFIX)?;
    let rest = &text[at + META_PREFIX.len()..];
    let object = first_json_object(rest)?;
    serde_json::from_str(object).ok()
}
