//! Grouping and markdown rendering of cached report rows.

use crate::normalizer::ITEM_REFERENCE_FIELD;
use serde_json::Value;
use std::collections::HashMap;

/// Sentinel bucket for rows without a value under the grouping key.
pub const NONE_GROUP: &str = "(none)";

/// A group of rows sharing one normalized key value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Display name: the first-seen trimmed original value.
    pub name: String,
    pub items: Vec<Value>,
}

/// Groups rows by a key field, case-insensitively on trimmed values.
///
/// Returns the groups sorted by descending size then name, plus the
/// matching `(name, count)` pairs.
pub fn group_by(items: &[Value], key: &str) -> (Vec<Group>, Vec<(String, usize)>) {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Group> = HashMap::new();

    for item in items {
        let raw = item
            .as_object()
            .and_then(|obj| obj.get(key))
            .and_then(value_as_label);
        let display = raw.unwrap_or_else(|| NONE_GROUP.to_string());
        let normalized = display.to_lowercase();

        let group = buckets.entry(normalized.clone()).or_insert_with(|| {
            order.push(normalized);
            Group {
                name: display,
                items: Vec::new(),
            }
        });
        group.items.push(item.clone());
    }

    let mut groups: Vec<Group> = order
        .into_iter()
        .filter_map(|k| buckets.remove(&k))
        .collect();
    // descending size, name as the deterministic tie-break
    groups.sort_by(|a, b| {
        b.items
            .len()
            .cmp(&a.items.len())
            .then_with(|| a.name.cmp(&b.name))
    });

    let counts = groups
        .iter()
        .map(|g| (g.name.clone(), g.items.len()))
        .collect();
    (groups, counts)
}

/// Renders groups as deterministic markdown.
///
/// Each group lists up to `max_per_group` items, with an ellipsis count
/// when truncated.
pub fn render_groups(title: &str, groups: &[Group], max_per_group: usize) -> String {
    let mut out = format!("## {}\n", title);
    for group in groups {
        out.push_str(&format!("\n### {} ({})\n", group.name, group.items.len()));
        for item in group.items.iter().take(max_per_group) {
            out.push_str(&format!("- {}\n", item_label(item)));
        }
        if group.items.len() > max_per_group {
            out.push_str(&format!("- … +{} more\n", group.items.len() - max_per_group));
        }
    }
    out
}

fn value_as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn item_label(item: &Value) -> String {
    if let Some(reference) = item.get(ITEM_REFERENCE_FIELD).and_then(Value::as_str) {
        return reference.to_string();
    }
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
