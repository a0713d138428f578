//! Section-aware report filtering.
//!
//! Criteria are scoped by section type: a declaration-review queue accepts
//! channel/status/age criteria, a pendencies section accepts a pendency
//! type, an ETA-changed section accepts a change direction and a day
//! threshold. Criteria that do not apply to a section type are ignored, so
//! partially-specified filters are always safe to pass through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Direction of an ETA change, measured on the day delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Delay,
    Early,
}

/// Filter criteria for a section. All fields optional; only the ones the
/// section type understands are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionCriteria {
    /// Clearance channel, case-insensitive equality (review queues).
    pub channel: Option<String>,
    /// Substring match on the status text (review queues).
    pub status_contains: Option<String>,
    /// Minimum age in days (review queues).
    pub min_age_days: Option<i64>,
    /// Pendency type, case-insensitive equality (pendency sections).
    pub pendency_type: Option<String>,
    /// Direction of the ETA change (ETA sections).
    pub change_type: Option<ChangeType>,
    /// Minimum absolute day difference (ETA sections).
    pub min_days: Option<i64>,
}

impl SectionCriteria {
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Self::default()
        }
    }
}

/// The section types the engine understands, detected from section names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Declaration review queues ("review_queue", "canal", …).
    ReviewQueue,
    /// Pending-issue lists ("pendencies", "pendencias", …).
    Pendencies,
    /// Arrival-estimate changes ("eta_changed", "eta", …).
    EtaChanged,
    /// Anything else; no criteria apply.
    Generic,
}

impl SectionKind {
    pub fn detect(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("pendenc") {
            Self::Pendencies
        } else if name.contains("eta") || name.contains("chegada") {
            Self::EtaChanged
        } else if name.contains("review") || name.contains("canal") || name.contains("channel")
            || name.contains("conferencia")
            || name.contains("conferência")
        {
            Self::ReviewQueue
        } else {
            Self::Generic
        }
    }
}

const CHANNEL_FIELDS: &[&str] = &["channel", "canal"];
const STATUS_FIELDS: &[&str] = &["status", "situacao", "situação"];
const AGE_FIELDS: &[&str] = &["age_days", "dias_parado", "days_open"];
const PENDENCY_FIELDS: &[&str] = &["pendency_type", "tipo_pendencia", "pendency"];
const DELTA_FIELDS: &[&str] = &["delta_days", "eta_delta_days", "dias_diferenca"];

/// Filters a section's rows with section-scoped criteria.
///
/// Returns the surviving rows plus an echo map of the criteria that were
/// actually applied; the echo feeds the derived report's
/// `filters_applied` provenance.
pub fn filter_section(
    section_name: &str,
    rows: &[Value],
    criteria: &SectionCriteria,
) -> (Vec<Value>, Map<String, Value>) {
    let kind = SectionKind::detect(section_name);
    let mut echo = Map::new();
    let mut survivors: Vec<Value> = rows.to_vec();

    match kind {
        SectionKind::ReviewQueue => {
            if let Some(channel) = &criteria.channel {
                survivors.retain(|row| {
                    get_str(row, CHANNEL_FIELDS)
                        .map(|v| v.eq_ignore_ascii_case(channel))
                        .unwrap_or(false)
                });
                echo.insert("channel".into(), Value::String(channel.clone()));
            }
            if let Some(status) = &criteria.status_contains {
                let needle = status.to_lowercase();
                survivors.retain(|row| {
                    get_str(row, STATUS_FIELDS)
                        .map(|v| v.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                });
                echo.insert("status_contains".into(), Value::String(status.clone()));
            }
            if let Some(min_age) = criteria.min_age_days {
                survivors.retain(|row| {
                    get_i64(row, AGE_FIELDS)
                        .map(|age| age >= min_age)
                        .unwrap_or(false)
                });
                echo.insert("min_age_days".into(), Value::from(min_age));
            }
        }
        SectionKind::Pendencies => {
            if let Some(pendency) = &criteria.pendency_type {
                survivors.retain(|row| {
                    get_str(row, PENDENCY_FIELDS)
                        .map(|v| v.eq_ignore_ascii_case(pendency))
                        .unwrap_or(false)
                });
                echo.insert("pendency_type".into(), Value::String(pendency.clone()));
            }
        }
        SectionKind::EtaChanged => {
            if let Some(change) = criteria.change_type {
                survivors.retain(|row| match get_i64(row, DELTA_FIELDS) {
                    Some(delta) => match change {
                        ChangeType::Delay => delta > 0,
                        ChangeType::Early => delta < 0,
                    },
                    None => false,
                });
                let label = match change {
                    ChangeType::Delay => "DELAY",
                    ChangeType::Early => "EARLY",
                };
                echo.insert("change_type".into(), Value::String(label.into()));
            }
            if let Some(min_days) = criteria.min_days {
                // compared on the absolute day difference
                survivors.retain(|row| {
                    get_i64(row, DELTA_FIELDS)
                        .map(|delta| delta.abs() >= min_days)
                        .unwrap_or(false)
                });
                echo.insert("min_days".into(), Value::from(min_days));
            }
        }
        SectionKind::Generic => {}
    }

    (survivors, echo)
}

fn get_str<'a>(row: &'a Value, fields: &[&str]) -> Option<&'a str> {
    let obj = row.as_object()?;
    fields.iter().find_map(|f| obj.get(*f).and_then(Value::as_str))
}

fn get_i64(row: &Value, fields: &[&str]) -> Option<i64> {
    let obj = row.as_object()?;
    fields.iter().find_map(|f| {
        obj.get(*f).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f.round() as i64))
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })
}
