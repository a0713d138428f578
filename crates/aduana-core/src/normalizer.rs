//! Payload normalization.
//!
//! Report payloads arrive from several legacy generators with inconsistent
//! field names. Normalization guarantees every item in every list of
//! objects carries two canonical fields, `item_reference` and `category`,
//! so the filter/grouping/query engines never chase aliases themselves.
//!
//! Idempotent by construction: canonical fields are only filled when absent
//! or empty, never overwritten.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Canonical reference field every normalized item carries.
pub const ITEM_REFERENCE_FIELD: &str = "item_reference";
/// Canonical category field every normalized item carries.
pub const CATEGORY_FIELD: &str = "category";

const REFERENCE_ALIASES: &[&str] = &[
    ITEM_REFERENCE_FIELD,
    "reference",
    "process",
    "ref",
    "processo",
    "referencia",
    "referência",
    "process_number",
    "numero_processo",
];

const CATEGORY_ALIASES: &[&str] = &[
    CATEGORY_FIELD,
    "categoria",
    "client_category",
    "categoria_cliente",
];

// Dotted reference: "DMD.0012/26" → category "DMD"
static DOTTED_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z0-9]{2,6})\.\d{1,6}/\d{2}\b").unwrap());

// Concatenated reference is ambiguous (prefix runs into the number), so the
// pattern is stricter: anchored, uppercase letters only
static COMPACT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{2,5})\d{3,6}/\d{2}$").unwrap());

/// Infers a category from an item reference.
///
/// `"DMD.0012/26"` → `"DMD"`; `"DMD0012/26"` → `"DMD"`; anything else is
/// left to the report-level default.
pub fn infer_category(reference: &str) -> Option<String> {
    if let Some(caps) = DOTTED_REFERENCE.captures(reference) {
        return Some(caps[1].to_uppercase());
    }
    COMPACT_REFERENCE
        .captures(reference.trim())
        .map(|caps| caps[1].to_string())
}

/// Normalizes a report payload in place.
///
/// Walks every list of objects under `payload.sections` (nested maps
/// included) and, defensively, top-level lists, filling the canonical
/// fields of each object item.
pub fn normalize(payload: &mut Value, default_category: Option<&str>) {
    let Some(root) = payload.as_object_mut() else {
        return;
    };
    for (name, value) in root.iter_mut() {
        if name == "sections" {
            walk(value, default_category);
        } else if value.is_array() {
            walk(value, default_category);
        }
    }
}

// Recursion is bounded by the payload itself; report payloads are shallow.
fn walk(value: &mut Value, default_category: Option<&str>) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                match item {
                    Value::Object(obj) => fill_item(obj, default_category),
                    Value::Array(_) => walk(item, default_category),
                    _ => {}
                }
            }
        }
        Value::Object(map) => {
            for (_, nested) in map.iter_mut() {
                if nested.is_array() || nested.is_object() {
                    walk(nested, default_category);
                }
            }
        }
        _ => {}
    }
}

fn fill_item(item: &mut Map<String, Value>, default_category: Option<&str>) {
    if field_is_empty(item, ITEM_REFERENCE_FIELD) {
        if let Some(reference) = lookup_alias(item, REFERENCE_ALIASES) {
            item.insert(ITEM_REFERENCE_FIELD.to_string(), Value::String(reference));
        }
    }

    if !field_is_empty(item, CATEGORY_FIELD) {
        return;
    }
    if let Some(category) = lookup_alias(item, CATEGORY_ALIASES) {
        item.insert(CATEGORY_FIELD.to_string(), Value::String(category));
        return;
    }
    let inferred = item
        .get(ITEM_REFERENCE_FIELD)
        .and_then(Value::as_str)
        .and_then(infer_category)
        .or_else(|| default_category.map(str::to_string));
    if let Some(category) = inferred {
        item.insert(CATEGORY_FIELD.to_string(), Value::String(category));
    }
}

fn field_is_empty(item: &Map<String, Value>, field: &str) -> bool {
    match item.get(field) {
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Null) | None => true,
        Some(_) => false,
    }
}

/// First populated string among the aliases, including one nested level
/// (e.g. `{"process": {"reference": "DMD.0012/26"}}`).
fn lookup_alias(item: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        match item.get(*alias) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_string());
            }
            Some(Value::Object(nested)) => {
                for nested_alias in aliases {
                    if let Some(Value::String(s)) = nested.get(*nested_alias) {
                        if !s.trim().is_empty() {
                            return Some(s.trim().to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}
