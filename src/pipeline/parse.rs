//! Model response parsing: raw text → list of candidate entries.
//!
//! Accepted shapes, tried in order:
//! 1. a bare JSON array of poem objects;
//! 2. a JSON object whose `"poems"` key holds such an array.
//!
//! Models occasionally wrap JSON in a ```` ```json ```` fence despite JSON
//! mode; the fence is stripped before parsing. Anything else is a
//! page-scoped [`PageError`].

use crate::error::PageError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*?)\n?```$").unwrap());

type Shape = for<'a> fn(&'a Value) -> Option<&'a Vec<Value>>;

const SHAPES: &[Shape] = &[bare_list, poems_key];

/// Parse a model response into its list of candidate entries.
///
/// Entries are returned as-is; they may not all be objects.
pub fn parse_candidates(page: usize, raw: &str) -> Result<Vec<Value>, PageError> {
    let body = strip_json_fence(raw);
    let parsed: Value = serde_json::from_str(body).map_err(|e| PageError::InvalidJson {
        page,
        detail: e.to_string(),
    })?;

    SHAPES
        .iter()
        .find_map(|shape| shape(&parsed))
        .cloned()
        .ok_or_else(|| PageError::UnexpectedShape {
            page,
            found: describe(&parsed).to_string(),
        })
}

fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str())
}

fn bare_list(v: &Value) -> Option<&Vec<Value>> {
    v.as_array()
}

fn poems_key(v: &Value) -> Option<&Vec<Value>> {
    v.get("poems")?.as_array()
}

fn describe(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(o) if o.contains_key("poems") => "object whose \"poems\" is not a list",
        Value::Object(_) => "object without a \"poems\" key",
    }
}
