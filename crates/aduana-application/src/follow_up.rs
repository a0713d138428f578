//! Applies structured follow-up plans to cached reports.
//!
//! This is the consumer side of the planner: a `FilterPlan` (from an LLM
//! tier or the heuristic) is executed against the picked report's cached
//! payload, and the result is persisted as a derived report. The base
//! report is never touched.

use crate::lifecycle::ReportLifecycleManager;
use aduana_core::error::{AduanaError, Result};
use aduana_core::filter::{SectionCriteria, filter_section};
use aduana_core::grouping::{group_by, render_groups};
use aduana_core::normalizer::CATEGORY_FIELD;
use aduana_core::plan::{FilterPlan, PlanAction};
use aduana_core::report::{Report, ReportDraft};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Executes filter/group plans over a report's cached sections.
pub struct ReportFollowUpEngine {
    lifecycle: Arc<ReportLifecycleManager>,
}

impl ReportFollowUpEngine {
    pub fn new(lifecycle: Arc<ReportLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Applies a plan to `base` and persists the outcome as a derived
    /// report with lineage. Fails with `RowsMissing` for display-only
    /// reports.
    pub async fn apply(&self, session: &str, base: &Report, plan: &FilterPlan) -> Result<Report> {
        let sections = payload_sections(base)?;

        let draft = match plan.action {
            PlanAction::FilterByCategory => filter_by_category(base, &sections, plan)?,
            PlanAction::FetchSection => fetch_section(base, &sections, plan)?,
            PlanAction::GroupByChannel => group_by_channel(base, &sections)?,
        };
        self.lifecycle.save_derived(session, draft, base).await
    }
}

/// Named list-of-object sections of the payload.
fn payload_sections(report: &Report) -> Result<Vec<(String, Vec<Value>)>> {
    let payload = report
        .payload
        .as_ref()
        .ok_or_else(|| AduanaError::rows_missing(&report.id))?;

    let mut sections = Vec::new();
    if let Some(map) = payload.get("sections").and_then(Value::as_object) {
        for (name, value) in map {
            if let Some(rows) = value.as_array() {
                if rows.iter().all(Value::is_object) {
                    sections.push((name.clone(), rows.clone()));
                }
            }
        }
    }
    if sections.is_empty() {
        return Err(AduanaError::rows_missing(&report.id));
    }
    Ok(sections)
}

fn filter_by_category(
    base: &Report,
    sections: &[(String, Vec<Value>)],
    plan: &FilterPlan,
) -> Result<ReportDraft> {
    let category = plan
        .category
        .as_deref()
        .ok_or_else(|| AduanaError::InvalidCriteria("filter_by_category without a category".into()))?;

    let mut kept = Map::new();
    let mut total = 0usize;
    for (name, rows) in sections {
        let rows: Vec<Value> = rows
            .iter()
            .filter(|row| {
                row.get(CATEGORY_FIELD)
                    .and_then(Value::as_str)
                    .map(|c| c.eq_ignore_ascii_case(category))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        total += rows.len();
        kept.insert(name.clone(), Value::Array(rows));
    }

    let rendered = format!(
        "## {} / category {}\n\n{} matching items\n",
        base.kind, category, total
    );
    let mut filters = Map::new();
    filters.insert("category".into(), Value::String(category.to_string()));

    Ok(derived_draft(base, rendered, json!({ "sections": kept }), filters))
}

fn fetch_section(
    base: &Report,
    sections: &[(String, Vec<Value>)],
    plan: &FilterPlan,
) -> Result<ReportDraft> {
    let (name, rows) = match plan.section.as_deref() {
        Some(wanted) => sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AduanaError::not_found("section", wanted))?,
        // a plan without a section falls back to the first one
        None => &sections[0],
    };

    let criteria = SectionCriteria {
        channel: plan.channel.clone(),
        pendency_type: plan.pendency_type.clone(),
        change_type: plan.change_type,
        min_days: plan.min_days,
        ..SectionCriteria::default()
    };
    let (filtered, echo) = filter_section(name, rows, &criteria);

    let mut rendered = format!("## {} / {}\n\n", base.kind, name);
    for row in &filtered {
        let label = row
            .get("item_reference")
            .and_then(Value::as_str)
            .unwrap_or("-");
        rendered.push_str(&format!("- {}\n", label));
    }
    rendered.push_str(&format!("\n{} items\n", filtered.len()));

    let mut section_map = Map::new();
    section_map.insert(name.clone(), Value::Array(filtered));
    Ok(derived_draft(
        base,
        rendered,
        json!({ "sections": section_map }),
        echo,
    ))
}

fn group_by_channel(base: &Report, sections: &[(String, Vec<Value>)]) -> Result<ReportDraft> {
    let rows: Vec<Value> = sections
        .iter()
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();
    let (groups, counts) = group_by(&rows, "channel");
    let rendered = render_groups("By channel", &groups, 10);

    let grouped: Vec<Value> = groups
        .iter()
        .map(|g| {
            json!({
                "channel": g.name,
                "count": g.items.len(),
                "items": g.items,
            })
        })
        .collect();

    let mut filters = Map::new();
    filters.insert("group_by".into(), Value::String("channel".into()));
    filters.insert("groups".into(), json!(counts.len()));

    Ok(derived_draft(
        base,
        rendered,
        json!({ "sections": { "by_channel": grouped } }),
        filters,
    ))
}

fn derived_draft(
    base: &Report,
    rendered: String,
    payload: Value,
    filters: Map<String, Value>,
) -> ReportDraft {
    let mut draft = ReportDraft::new(base.kind.clone(), rendered)
        .with_payload(payload)
        .with_filters(filters);
    if let Some(category) = &base.category {
        draft = draft.with_category(category.clone());
    }
    draft
}
