//! Output normalization: any supported result shape → `{line_items, header}`.
//!
//! The service returns extraction results in several shapes depending on the
//! agent, the workflow and, apparently, the day: a bare array of items, an
//! object with `items` or `line_items`, an `entry_summary` wrapper, or any of
//! those serialised (sometimes twice) into a JSON string. [`normalize`] folds
//! them all into one [`NormalizedExtraction`]. It is pure and never fails;
//! input it cannot interpret comes back with an [`issue`] attached.
//!
//! [`issue`]: NormalizedExtraction::issue

use crate::output::NormalizedExtraction;
use serde_json::{Map, Value};

/// How many times a string that decodes to another string is re-decoded.
const MAX_STRING_NESTING: usize = 3;

/// Decode JSON text, falling back to un-escaping when the text is an escaped
/// JSON document (`{\"items\": []}`) rather than a valid one.
///
/// A string that decodes to another JSON string is decoded again; once any
/// pass has succeeded, a later failure yields the last decoded string. Returns
/// the parse error only when the text is not JSON at all.
pub fn decode_text(text: &str) -> Result<Value, String> {
    let mut current = text.to_string();
    for pass in 0..MAX_STRING_NESTING {
        let value = match serde_json::from_str::<Value>(current.trim()) {
            Ok(v) => v,
            Err(first) => match serde_json::from_str::<Value>(&unescape(&current)) {
                Ok(v) => v,
                Err(_) if pass > 0 => return Ok(Value::String(current)),
                Err(_) => return Err(first.to_string()),
            },
        };
        match value {
            Value::String(inner) => current = inner,
            other => return Ok(other),
        }
    }
    // Still a string after repeated decoding: that string is the value.
    Ok(Value::String(current))
}

/// Decode a raw `output` field.
///
/// Strings are run through [`decode_text`]; if that fails the raw string is
/// returned unchanged so the caller can still inspect it. Other values pass
/// through untouched.
pub fn decode_output(raw: &Value) -> Value {
    match raw {
        Value::String(s) => decode_text(s).unwrap_or_else(|_| raw.clone()),
        other => other.clone(),
    }
}

/// `true` when a decoded output already looks like extraction data: an
/// object carrying `line_items`, `items` or `entry_summary`, or a non-empty
/// array.
pub fn looks_like_result(output: &Value) -> bool {
    match output {
        Value::Object(map) => ["line_items", "items", "entry_summary"]
            .iter()
            .any(|k| map.contains_key(*k)),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn unescape(text: &str) -> String {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);
    inner
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\/", "/")
}

/// Normalize a decoded result value.
pub fn normalize(raw: &Value) -> NormalizedExtraction {
    match raw {
        Value::String(text) => match decode_text(text) {
            Ok(Value::String(_)) => {
                NormalizedExtraction::with_issue("output is a plain string, not JSON", text.clone())
            }
            Ok(decoded) => normalize(&decoded),
            Err(e) => NormalizedExtraction::with_issue(format!("invalid JSON: {e}"), text.clone()),
        },
        Value::Array(items) => NormalizedExtraction {
            line_items: items.clone(),
            ..NormalizedExtraction::default()
        },
        Value::Object(map) => normalize_object(map),
        other => NormalizedExtraction::with_issue(
            format!("unsupported output type: {}", type_name(other)),
            other.to_string(),
        ),
    }
}

fn normalize_object(map: &Map<String, Value>) -> NormalizedExtraction {
    for key in ["items", "line_items"] {
        if let Some(items) = map.get(key) {
            return NormalizedExtraction {
                line_items: as_items(items),
                header: without(map, key),
                issue: None,
            };
        }
    }

    if let Some(Value::Object(summary)) = map.get("entry_summary") {
        return NormalizedExtraction {
            line_items: summary.get("line_items").map(as_items).unwrap_or_default(),
            header: without(summary, "line_items"),
            issue: None,
        };
    }

    NormalizedExtraction {
        line_items: Vec::new(),
        header: map.clone(),
        issue: None,
    }
}

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        single => vec![single.clone()],
    }
}

fn without(map: &Map<String, Value>, key: &str) -> Map<String, Value> {
    map.iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
