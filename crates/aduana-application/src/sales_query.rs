//! Deterministic queries over cached sales reports.
//!
//! `SalesReportQueryEngine` re-applies structured criteria and ABC
//! classification directly over the cached row set of a sales-by-invoice
//! report; no SQL is ever issued. Every result is persisted as a new
//! report whose lineage points back to the base.

use crate::lifecycle::ReportLifecycleManager;
use aduana_core::abc::{AbcEntry, AbcOptions, AbcOutcome, classify_abc};
use aduana_core::error::{AduanaError, Result};
use aduana_core::report::{Report, ReportDraft, ReportKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const CLIENT_FIELDS: &[&str] = &["client", "cliente"];
const COMPANY_FIELDS: &[&str] = &["company", "empresa"];
const OPERATION_FIELDS: &[&str] = &["operation", "op", "operation_type", "tipo_operacao"];
const COST_CENTER_FIELDS: &[&str] = &["cost_center", "centro_custo"];
const DATE_FIELDS: &[&str] = &["date", "data", "issue_date", "emissao"];
const VALUE_FIELDS: &[&str] = &["value", "net_value", "valor", "total"];
const INVOICE_FIELDS: &[&str] = &["invoice", "invoice_number", "nota", "numero_nota"];

/// Sort keys for filtered sales rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesSortKey {
    Value,
    Date,
    Client,
}

/// Structured criteria applied over the cached row set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesFilter {
    pub client_contains: Option<String>,
    pub company_contains: Option<String>,
    pub operation_contains: Option<String>,
    pub cost_center_contains: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub sort_by: Option<SalesSortKey>,
    pub descending: bool,
    pub top_n: Option<usize>,
}

/// Outcome of an ABC classification request.
#[derive(Debug, Clone)]
pub enum AbcResult {
    Classified {
        /// The persisted derived report.
        report: Report,
        entries: Vec<AbcEntry>,
        total_net: f64,
    },
    /// Non-positive net total; nothing was persisted.
    InsufficientData { total_net: f64 },
}

/// Lineage-tracked filter/ABC engine over cached sales reports.
pub struct SalesReportQueryEngine {
    lifecycle: Arc<ReportLifecycleManager>,
}

impl SalesReportQueryEngine {
    pub fn new(lifecycle: Arc<ReportLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Filters the cached rows of `base` and persists the result as a new
    /// report with `lineage.base_id = base.id`. The base is never mutated.
    pub async fn filter(
        &self,
        session: &str,
        base: &Report,
        criteria: &SalesFilter,
    ) -> Result<Report> {
        let rows = extract_rows(base)?;
        let filtered = apply_filter(rows, criteria);
        let rendered = render_sales_table(&filtered);

        let mut draft = ReportDraft::new(ReportKind::SalesByInvoice, rendered)
            .with_payload(json!({ "sections": { "invoices": filtered } }))
            .with_filters(criteria_echo(criteria));
        if let Some(category) = &base.category {
            draft = draft.with_category(category.clone());
        }
        self.lifecycle.save_derived(session, draft, base).await
    }

    /// Classifies the cached rows of `base` into ABC tiers per `group_by`
    /// and persists the classification as a derived `sales_abc` report.
    pub async fn classify_abc(
        &self,
        session: &str,
        base: &Report,
        group_by: &str,
        options: AbcOptions,
        top_n: Option<usize>,
    ) -> Result<AbcResult> {
        let rows = extract_rows(base)?;
        match classify_abc(&rows, group_by, options) {
            AbcOutcome::InsufficientData { total_net } => {
                Ok(AbcResult::InsufficientData { total_net })
            }
            AbcOutcome::Classified { entries, total_net } => {
                let rendered = render_abc_table(group_by, &entries, top_n);
                let shown: Vec<&AbcEntry> = match top_n {
                    Some(n) => entries.iter().take(n).collect(),
                    None => entries.iter().collect(),
                };
                let options = options.validated();
                let mut filters = Map::new();
                filters.insert("group_by".into(), Value::String(group_by.to_string()));
                filters.insert("a_threshold".into(), json!(options.a_threshold));
                filters.insert("b_threshold".into(), json!(options.b_threshold));
                if let Some(n) = top_n {
                    filters.insert("top_n".into(), json!(n));
                }

                let draft = ReportDraft::new(ReportKind::SalesAbc, rendered)
                    .with_payload(json!({ "sections": { "abc": shown } }))
                    .with_filters(filters);
                let report = self.lifecycle.save_derived(session, draft, base).await?;
                Ok(AbcResult::Classified {
                    report,
                    entries,
                    total_net,
                })
            }
        }
    }
}

/// The cached row set of a sales report: the first list of objects found
/// under `payload.sections`, falling back to top-level lists.
fn extract_rows(report: &Report) -> Result<Vec<Value>> {
    let payload = report
        .payload
        .as_ref()
        .ok_or_else(|| AduanaError::rows_missing(&report.id))?;

    if let Some(sections) = payload.get("sections").and_then(Value::as_object) {
        for value in sections.values() {
            if let Some(rows) = rows_of(value) {
                return Ok(rows);
            }
        }
    }
    if let Some(obj) = payload.as_object() {
        for value in obj.values() {
            if let Some(rows) = rows_of(value) {
                return Ok(rows);
            }
        }
    }
    Err(AduanaError::rows_missing(&report.id))
}

fn rows_of(value: &Value) -> Option<Vec<Value>> {
    let list = value.as_array()?;
    if !list.is_empty() && list.iter().all(Value::is_object) {
        Some(list.clone())
    } else {
        None
    }
}

fn apply_filter(mut rows: Vec<Value>, criteria: &SalesFilter) -> Vec<Value> {
    if let Some(needle) = &criteria.client_contains {
        retain_contains(&mut rows, CLIENT_FIELDS, needle);
    }
    if let Some(needle) = &criteria.company_contains {
        retain_contains(&mut rows, COMPANY_FIELDS, needle);
    }
    if let Some(needle) = &criteria.operation_contains {
        retain_contains(&mut rows, OPERATION_FIELDS, needle);
    }
    if let Some(needle) = &criteria.cost_center_contains {
        retain_contains(&mut rows, COST_CENTER_FIELDS, needle);
    }
    if criteria.date_from.is_some() || criteria.date_to.is_some() {
        rows.retain(|row| match row_date(row) {
            Some(date) => {
                criteria.date_from.map(|from| date >= from).unwrap_or(true)
                    && criteria.date_to.map(|to| date <= to).unwrap_or(true)
            }
            None => false,
        });
    }
    if let Some(min) = criteria.min_value {
        rows.retain(|row| row_value(row).map(|v| v >= min).unwrap_or(false));
    }
    if let Some(max) = criteria.max_value {
        rows.retain(|row| row_value(row).map(|v| v <= max).unwrap_or(false));
    }

    if let Some(sort_key) = criteria.sort_by {
        match sort_key {
            SalesSortKey::Value => rows.sort_by(|a, b| {
                let av = row_value(a).unwrap_or(0.0);
                let bv = row_value(b).unwrap_or(0.0);
                av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal)
            }),
            SalesSortKey::Date => rows.sort_by_key(row_date),
            SalesSortKey::Client => {
                rows.sort_by_key(|row| field_str(row, CLIENT_FIELDS).map(str::to_lowercase))
            }
        }
        if criteria.descending {
            rows.reverse();
        }
    }

    if let Some(n) = criteria.top_n {
        rows.truncate(n);
    }
    rows
}

/// Echo of the criteria that were actually applied, for provenance in the
/// derived report's `filters_applied`.
fn criteria_echo(criteria: &SalesFilter) -> Map<String, Value> {
    let mut echo = Map::new();
    let mut put_str = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            echo.insert(key.to_string(), Value::String(v.clone()));
        }
    };
    put_str("client_contains", &criteria.client_contains);
    put_str("company_contains", &criteria.company_contains);
    put_str("operation_contains", &criteria.operation_contains);
    put_str("cost_center_contains", &criteria.cost_center_contains);
    if let Some(from) = criteria.date_from {
        echo.insert("date_from".into(), Value::String(from.to_string()));
    }
    if let Some(to) = criteria.date_to {
        echo.insert("date_to".into(), Value::String(to.to_string()));
    }
    if let Some(min) = criteria.min_value {
        echo.insert("min_value".into(), json!(min));
    }
    if let Some(max) = criteria.max_value {
        echo.insert("max_value".into(), json!(max));
    }
    if let Some(sort) = criteria.sort_by {
        // serde gives the snake_case label back
        if let Ok(label) = serde_json::to_value(sort) {
            echo.insert("sort_by".into(), label);
        }
        echo.insert("descending".into(), Value::Bool(criteria.descending));
    }
    if let Some(n) = criteria.top_n {
        echo.insert("top_n".into(), json!(n));
    }
    echo
}

fn retain_contains(rows: &mut Vec<Value>, fields: &[&str], needle: &str) {
    let needle = needle.to_lowercase();
    rows.retain(|row| {
        field_str(row, fields)
            .map(|v| v.to_lowercase().contains(&needle))
            .unwrap_or(false)
    });
}

fn field_str<'a>(row: &'a Value, fields: &[&str]) -> Option<&'a str> {
    let obj = row.as_object()?;
    fields.iter().find_map(|f| obj.get(*f).and_then(Value::as_str))
}

fn row_value(row: &Value) -> Option<f64> {
    let obj = row.as_object()?;
    VALUE_FIELDS.iter().find_map(|f| {
        obj.get(*f).and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })
}

fn row_date(row: &Value) -> Option<NaiveDate> {
    field_str(row, DATE_FIELDS).and_then(|s| s.get(..10)?.parse().ok())
}

fn render_sales_table(rows: &[Value]) -> String {
    let mut out = String::from("## Sales by invoice (filtered)\n\n");
    out.push_str("| Invoice | Client | Operation | Value |\n");
    out.push_str("|---|---|---|---|\n");
    let mut total = 0.0;
    for row in rows {
        let value = row_value(row).unwrap_or(0.0);
        total += value;
        out.push_str(&format!(
            "| {} | {} | {} | {:.2} |\n",
            field_str(row, INVOICE_FIELDS).unwrap_or("-"),
            field_str(row, CLIENT_FIELDS).unwrap_or("-"),
            field_str(row, OPERATION_FIELDS).unwrap_or("-"),
            value,
        ));
    }
    out.push_str(&format!("\n{} rows, total {:.2}\n", rows.len(), total));
    out
}

fn render_abc_table(group_by: &str, entries: &[AbcEntry], top_n: Option<usize>) -> String {
    let shown = top_n.unwrap_or(entries.len()).min(entries.len());
    let mut out = format!("## ABC classification by {}\n\n", group_by);
    out.push_str(&format!("| # | {} | Net value | Share | Cumulative | Class |\n", group_by));
    out.push_str("|---|---|---|---|---|---|\n");
    for (i, entry) in entries.iter().take(shown).enumerate() {
        out.push_str(&format!(
            "| {} | {} | {:.2} | {:.1}% | {:.1}% | {} |\n",
            i + 1,
            entry.key,
            entry.net_value,
            entry.share * 100.0,
            entry.cumulative_share * 100.0,
            entry.class,
        ));
    }
    if entries.len() > shown {
        out.push_str(&format!("\n… +{} more groups\n", entries.len() - shown));
    }
    out
}
