//! Structured follow-up plans.
//!
//! A `FilterPlan` is the bridge between a free-text follow-up ("just the
//! green channel ones") and the typed filter/grouping engines. Plans come
//! out of LLM tiers or the local heuristic; the parsing here is defensive
//! because model output routinely arrives fenced, wrapped or with renamed
//! keys.

use crate::error::{AduanaError, Result};
use crate::filter::ChangeType;
use crate::report::{Report, ReportKind};
use crate::util::first_json_object;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three actions a plan can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    FilterByCategory,
    FetchSection,
    GroupByChannel,
}

impl PlanAction {
    fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "filter_by_category" => Some(Self::FilterByCategory),
            "fetch_section" => Some(Self::FetchSection),
            "group_by_channel" => Some(Self::GroupByChannel),
            _ => None,
        }
    }
}

/// A structured follow-up plan over a cached report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPlan {
    pub action: PlanAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pendency_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_days: Option<i64>,
}

impl FilterPlan {
    pub fn filter_by_category(category: impl Into<String>) -> Self {
        Self {
            action: PlanAction::FilterByCategory,
            category: Some(category.into()),
            ..Self::empty(PlanAction::FilterByCategory)
        }
    }

    pub fn fetch_section(section: impl Into<String>) -> Self {
        Self {
            section: Some(section.into()),
            ..Self::empty(PlanAction::FetchSection)
        }
    }

    pub fn group_by_channel() -> Self {
        Self::empty(PlanAction::GroupByChannel)
    }

    fn empty(action: PlanAction) -> Self {
        Self {
            action,
            category: None,
            section: None,
            channel: None,
            pendency_type: None,
            change_type: None,
            min_days: None,
        }
    }
}

/// What the planner knows about the report being followed up on.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanContext {
    pub kind: ReportKind,
    /// Section names present in the report payload.
    pub sections: Vec<String>,
    pub default_category: Option<String>,
}

impl PlanContext {
    pub fn for_report(report: &Report) -> Self {
        let sections = report
            .payload
            .as_ref()
            .and_then(|p| p.get("sections"))
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            kind: report.kind.clone(),
            sections,
            default_category: report.category.clone(),
        }
    }
}

const ACTION_KEYS: &[&str] = &["action", "plan_action", "acao", "ação", "intent"];
const CATEGORY_KEYS: &[&str] = &["category", "categoria", "client_category"];
const SECTION_KEYS: &[&str] = &["section", "secao", "seção", "section_name"];
const CHANNEL_KEYS: &[&str] = &["channel", "canal"];
const PENDENCY_KEYS: &[&str] = &["pendency_type", "tipo_pendencia", "pendency"];
const CHANGE_KEYS: &[&str] = &["change_type", "change", "tipo_mudanca"];
const MIN_DAYS_KEYS: &[&str] = &["min_days", "minDays", "days", "dias"];

/// Parses an LLM response into a `FilterPlan`.
///
/// Tolerates code fences, prose around the JSON, key aliases and the
/// nested `{"fetch_section": {…}}` shape. Anything that still fails to
/// yield one of the three known actions is a `PlannerParse` error, which
/// the caller absorbs by falling through to the next tier.
pub fn parse_plan_response(raw: &str) -> Result<FilterPlan> {
    let cleaned = strip_code_fences(raw);
    let object = first_json_object(&cleaned)
        .ok_or_else(|| AduanaError::planner_parse("no JSON object in response"))?;
    let value: Value = serde_json::from_str(object)
        .map_err(|e| AduanaError::planner_parse(format!("invalid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| AduanaError::planner_parse("response is not an object"))?;

    let (action, fields) = unwrap_shape(obj)?;

    let mut plan = FilterPlan {
        action,
        category: string_field(&fields, CATEGORY_KEYS),
        section: string_field(&fields, SECTION_KEYS),
        channel: string_field(&fields, CHANNEL_KEYS),
        pendency_type: string_field(&fields, PENDENCY_KEYS),
        change_type: None,
        min_days: int_field(&fields, MIN_DAYS_KEYS),
    };
    if let Some(label) = string_field(&fields, CHANGE_KEYS) {
        plan.change_type = match label.trim().to_uppercase().as_str() {
            "DELAY" | "ATRASO" => Some(ChangeType::Delay),
            "EARLY" | "ADIANTADO" => Some(ChangeType::Early),
            _ => None,
        };
    }
    Ok(plan)
}

/// Resolves the two accepted object shapes:
/// `{"action": "fetch_section", …fields}` and `{"fetch_section": {…fields}}`.
fn unwrap_shape(obj: &Map<String, Value>) -> Result<(PlanAction, Map<String, Value>)> {
    if let Some(label) = ACTION_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
    {
        let action = PlanAction::from_label(label)
            .ok_or_else(|| AduanaError::planner_parse(format!("unknown action '{label}'")))?;
        return Ok((action, obj.clone()));
    }

    if obj.len() == 1 {
        if let Some((key, inner)) = obj.iter().next() {
            if let (Some(action), Some(fields)) = (PlanAction::from_label(key), inner.as_object())
            {
                return Ok((action, fields.clone()));
            }
        }
    }

    Err(AduanaError::planner_parse("no action field in response"))
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        obj.get(*k).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
    })
}

fn int_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| {
        obj.get(*k).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })
}

fn strip_code_fences(raw: &str) -> String {
    if !raw.contains("```") {
        return raw.to_string();
    }
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Heuristic tier
// ---------------------------------------------------------------------------

static MIN_DAYS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:or more\s+)?(?:day|dia)").unwrap());

static CATEGORY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:category|categoria)\s+([A-Za-z0-9]{2,6})\b").unwrap());

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2,6})\b").unwrap());

// All-caps tokens that are vocabulary, not client-category codes
const CODE_STOPLIST: &[&str] = &["ETA", "ABC", "ICMS", "OK", "ASAP"];

// Word-bounded: "filtered" must not match "red"
static CHANNEL_COLOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(green|verde|red|vermelho|yellow|amarelo|gray|grey|cinza)\b").unwrap()
});

static EARLY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(early|adiant\w*)\b").unwrap());

static DELAY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(delay\w*|atras\w*)\b").unwrap());

fn canonical_color(word: &str) -> &'static str {
    match word {
        "green" | "verde" => "green",
        "red" | "vermelho" => "red",
        "yellow" | "amarelo" => "yellow",
        _ => "gray",
    }
}

const PENDENCY_HINTS: &[(&str, &str)] = &[
    ("documentation", "documentation"),
    ("documentacao", "documentation"),
    ("documentação", "documentation"),
    ("payment", "payment"),
    ("pagamento", "payment"),
    ("license", "license"),
    ("licenca", "license"),
    ("licença", "license"),
];

/// Keyword → plan mapping covering the common follow-ups. The terminal
/// planner tier: pure, no I/O, fails only when nothing matches.
pub fn heuristic_plan(instruction: &str, context: &PlanContext) -> Result<FilterPlan> {
    let lowered = instruction.to_lowercase();

    if lowered.contains("group by channel")
        || lowered.contains("por canal")
        || lowered.contains("group by the channel")
    {
        return Ok(FilterPlan::group_by_channel());
    }

    if let Some(caps) = CHANNEL_COLOR_PATTERN.captures(&lowered) {
        let section = pick_section(context, &["review", "canal", "channel"], "review_queue");
        let mut plan = FilterPlan::fetch_section(section);
        plan.channel = Some(canonical_color(&caps[1]).to_string());
        return Ok(plan);
    }

    if lowered.contains("pendenc") || lowered.contains("pending") {
        let section = pick_section(context, &["pendenc"], "pendencies");
        let mut plan = FilterPlan::fetch_section(section);
        plan.pendency_type = PENDENCY_HINTS
            .iter()
            .find(|(word, _)| lowered.contains(word))
            .map(|(_, canonical)| (*canonical).to_string());
        return Ok(plan);
    }

    let delayed = DELAY_PATTERN.is_match(&lowered);
    let early = EARLY_PATTERN.is_match(&lowered);
    if delayed || early {
        let section = pick_section(context, &["eta", "chegada"], "eta_changed");
        let mut plan = FilterPlan::fetch_section(section);
        plan.change_type = Some(if delayed {
            ChangeType::Delay
        } else {
            ChangeType::Early
        });
        plan.min_days = MIN_DAYS_PATTERN
            .captures(&lowered)
            .and_then(|caps| caps[1].parse().ok());
        return Ok(plan);
    }

    if let Some(caps) = CATEGORY_PATTERN.captures(instruction) {
        return Ok(FilterPlan::filter_by_category(caps[1].to_uppercase()));
    }
    if let Some(code) = CODE_PATTERN
        .captures_iter(instruction)
        .map(|caps| caps[1].to_string())
        .find(|code| !CODE_STOPLIST.contains(&code.as_str()))
    {
        return Ok(FilterPlan::filter_by_category(code));
    }

    Err(AduanaError::planner_parse(format!(
        "no heuristic matches instruction '{instruction}'"
    )))
}

fn pick_section(context: &PlanContext, hints: &[&str], fallback: &str) -> String {
    context
        .sections
        .iter()
        .find(|name| {
            let name = name.to_lowercase();
            hints.iter().any(|h| name.contains(h))
        })
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PlanContext {
        PlanContext {
            kind: ReportKind::DailyDashboard,
            sections: vec!["review_queue".into(), "pendencies".into(), "eta_changed".into()],
            default_category: None,
        }
    }

    #[test]
    fn test_parse_plain_object() {
        let plan = parse_plan_response(
            r#"{"action": "filter_by_category", "category": "DMD"}"#,
        )
        .unwrap();
        assert_eq!(plan.action, PlanAction::FilterByCategory);
        assert_eq!(plan.category.as_deref(), Some("DMD"));
    }

    #[test]
    fn test_parse_fenced_response_with_prose() {
        let raw = "Sure, here is the plan:\n```json\n{\"action\": \"group_by_channel\"}\n```\n";
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.action, PlanAction::GroupByChannel);
    }

    #[test]
    fn test_parse_nested_action_shape() {
        let raw = r#"{"fetch_section": {"section": "pendencies", "tipo_pendencia": "payment"}}"#;
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.section.as_deref(), Some("pendencies"));
        assert_eq!(plan.pendency_type.as_deref(), Some("payment"));
    }

    #[test]
    fn test_parse_alias_keys() {
        let raw = r#"{"acao": "fetch section", "canal": "green", "days": "3"}"#;
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.channel.as_deref(), Some("green"));
        assert_eq!(plan.min_days, Some(3));
    }

    #[test]
    fn test_unknown_action_is_a_parse_error() {
        let err = parse_plan_response(r#"{"action": "delete_everything"}"#).unwrap_err();
        assert!(err.is_planner_parse());
    }

    #[test]
    fn test_non_json_is_a_parse_error() {
        assert!(parse_plan_response("I could not decide").unwrap_err().is_planner_parse());
    }

    #[test]
    fn test_heuristic_channel_color() {
        let plan = heuristic_plan("just the green channel ones", &context()).unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.section.as_deref(), Some("review_queue"));
        assert_eq!(plan.channel.as_deref(), Some("green"));
    }

    #[test]
    fn test_heuristic_portuguese_color_is_canonicalized() {
        let plan = heuristic_plan("só os do canal vermelho", &context()).unwrap();
        assert_eq!(plan.channel.as_deref(), Some("red"));
    }

    #[test]
    fn test_heuristic_eta_delay_threshold() {
        let plan = heuristic_plan("which ones are delayed 5 days or more?", &context()).unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.section.as_deref(), Some("eta_changed"));
        assert_eq!(plan.change_type, Some(ChangeType::Delay));
        assert_eq!(plan.min_days, Some(5));
    }

    #[test]
    fn test_heuristic_group_by_channel() {
        let plan = heuristic_plan("group by channel please", &context()).unwrap();
        assert_eq!(plan.action, PlanAction::GroupByChannel);
    }

    #[test]
    fn test_heuristic_category_code() {
        let plan = heuristic_plan("only the DMD ones", &context()).unwrap();
        assert_eq!(plan.action, PlanAction::FilterByCategory);
        assert_eq!(plan.category.as_deref(), Some("DMD"));
    }

    #[test]
    fn test_heuristic_pendency() {
        let plan = heuristic_plan("show the payment pendencies", &context()).unwrap();
        assert_eq!(plan.action, PlanAction::FetchSection);
        assert_eq!(plan.section.as_deref(), Some("pendencies"));
        assert_eq!(plan.pendency_type.as_deref(), Some("payment"));
    }

    #[test]
    fn test_heuristic_gives_up_cleanly() {
        let err = heuristic_plan("write me a poem", &context()).unwrap_err();
        assert!(err.is_planner_parse());
    }
}
