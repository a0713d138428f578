//! ABC (Pareto) classification over cached sales aggregates.
//!
//! Net value per group is gross sales minus returns; tax-only and other
//! non-sale operation rows never contribute. Classes are assigned on the
//! running cumulative share of the positive total: A while the share stays
//! within `a_threshold`, then B within `b_threshold`, then C.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

pub const DEFAULT_A_THRESHOLD: f64 = 0.80;
pub const DEFAULT_B_THRESHOLD: f64 = 0.95;

// Tolerance for cumulative-share threshold comparisons: a group landing
// exactly on a threshold must classify into the lower tier regardless of
// accumulated rounding.
const SHARE_EPSILON: f64 = 1e-9;

const OPERATION_FIELDS: &[&str] = &["operation", "op", "operation_type", "tipo_operacao"];
const VALUE_FIELDS: &[&str] = &["value", "net_value", "valor", "total"];

// Rows whose operation is in neither set count as sales; silently dropping
// unrecognized revenue would skew every share downstream.
const RETURN_OPERATIONS: &[&str] = &["RETURN", "DEVOLUCAO", "DEVOLUÇÃO", "RETORNO"];
const EXCLUDED_OPERATIONS: &[&str] = &["ICMS", "TAX", "IMPOSTO", "NON_SALE", "AJUSTE_FISCAL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbcClass::A => write!(f, "A"),
            AbcClass::B => write!(f, "B"),
            AbcClass::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbcEntry {
    pub key: String,
    pub net_value: f64,
    /// This group's share of the positive total (negative for net-negative
    /// groups).
    pub share: f64,
    /// Running cumulative share at this row.
    pub cumulative_share: f64,
    pub class: AbcClass,
}

/// Classification thresholds. Must satisfy `0 < a < b < 1`; anything else
/// is auto-corrected to the defaults with a logged deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcOptions {
    pub a_threshold: f64,
    pub b_threshold: f64,
}

impl Default for AbcOptions {
    fn default() -> Self {
        Self {
            a_threshold: DEFAULT_A_THRESHOLD,
            b_threshold: DEFAULT_B_THRESHOLD,
        }
    }
}

impl AbcOptions {
    /// Returns validated thresholds, falling back to defaults when the
    /// configured pair is out of range.
    pub fn validated(self) -> Self {
        let valid = 0.0 < self.a_threshold
            && self.a_threshold < self.b_threshold
            && self.b_threshold < 1.0;
        if valid {
            self
        } else {
            warn!(
                a = self.a_threshold,
                b = self.b_threshold,
                "ABC thresholds out of range, using defaults"
            );
            Self::default()
        }
    }
}

/// Outcome of a classification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AbcOutcome {
    Classified {
        entries: Vec<AbcEntry>,
        /// Sum of all net values, including net-negative groups.
        total_net: f64,
    },
    /// The positive total is zero or negative; shares are undefined.
    InsufficientData { total_net: f64 },
}

/// Classifies cached sales rows into ABC tiers per group key.
///
/// Aggregation preserves first-appearance order, and the descending sort is
/// stable, so groups with equal net values keep their original relative
/// order.
pub fn classify_abc(rows: &[Value], group_key: &str, options: AbcOptions) -> AbcOutcome {
    let options = options.validated();

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();

    for row in rows {
        let Some(contribution) = net_contribution(row) else {
            continue;
        };
        let key = group_label(row, group_key);
        if !totals.contains_key(&key) {
            order.push(key.clone());
        }
        *totals.entry(key).or_insert(0.0) += contribution;
    }

    let mut grouped: Vec<(String, f64)> = order
        .into_iter()
        .map(|key| {
            let net = totals[&key];
            (key, net)
        })
        .collect();
    grouped.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let total_net: f64 = grouped.iter().map(|(_, net)| net).sum();
    let positive_total: f64 = grouped.iter().map(|(_, net)| net.max(0.0)).sum();
    if positive_total <= 0.0 {
        return AbcOutcome::InsufficientData { total_net };
    }

    let mut cumulative = 0.0;
    let entries = grouped
        .into_iter()
        .map(|(key, net)| {
            let share = net / positive_total;
            if net > 0.0 {
                cumulative += share;
            }
            let class = if net <= 0.0 {
                AbcClass::C
            } else if cumulative <= options.a_threshold + SHARE_EPSILON {
                AbcClass::A
            } else if cumulative <= options.b_threshold + SHARE_EPSILON {
                AbcClass::B
            } else {
                AbcClass::C
            };
            AbcEntry {
                key,
                net_value: net,
                share,
                cumulative_share: cumulative,
                class,
            }
        })
        .collect();

    AbcOutcome::Classified { entries, total_net }
}

/// Net contribution of one row: positive for sales, negative for returns,
/// `None` for excluded operations and rows without a numeric value.
fn net_contribution(row: &Value) -> Option<f64> {
    let obj = row.as_object()?;
    let value = VALUE_FIELDS.iter().find_map(|f| {
        obj.get(*f).and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })?;
    let operation = OPERATION_FIELDS
        .iter()
        .find_map(|f| obj.get(*f).and_then(Value::as_str))
        .unwrap_or("")
        .trim()
        .to_uppercase();

    if EXCLUDED_OPERATIONS.contains(&operation.as_str()) {
        return None;
    }
    if RETURN_OPERATIONS.contains(&operation.as_str()) {
        // returns may arrive signed either way
        return Some(-value.abs());
    }
    Some(value)
}

fn group_label(row: &Value, group_key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(group_key))
        .and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "(none)".to_string())
}
