//! Nested-path value extraction over raw object trees.
//!
//! Paths are dotted (`.status.phase`, leading dot optional). `[*]` joins
//! the sub-path extraction over every array element with commas;
//! `[?(@.K=="V")]` selects the first array element whose field `K` equals
//! the literal `V`. A field of the form `path1/path2` (both dotted)
//! renders as a `num/den` ratio.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Walks a dotted path through nested objects. Missing segments and
/// non-object values mid-walk yield `None`. Empty segments are skipped.
pub fn nested_value<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = obj;
    for segment in path.trim_start_matches('.').split('.') {
        if segment.is_empty() {
            continue;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Like [`nested_value`] but renders the result as a string; misses and
/// non-scalar detours yield the empty string.
pub fn nested_string(obj: &Value, path: &str) -> String {
    match nested_value(obj, path) {
        Some(v) => display_value(v),
        None => String::new(),
    }
}

/// Human rendering of a leaf value: strings verbatim, numbers without a
/// trailing `.0` for integers, null as empty, composites as compact JSON.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Resolves a formatter field against an object. Dispatches on the field
/// shape: age, ratio, filtered array, `[*]` array, plain dotted path.
pub fn extract_field(obj: &Value, field: &str, creation_ts: Option<DateTime<Utc>>) -> String {
    if field == ".metadata.creationTimestamp" {
        return render_age(creation_ts);
    }

    if field.starts_with('.') && field.matches('/').count() == 1 {
        if let Some((num, den)) = field.split_once('/') {
            return format!("{}/{}", nested_string(obj, num), nested_string(obj, den));
        }
    }

    if field.contains("[?(") {
        return filtered_array_field(obj, field);
    }

    if field.contains("[*]") {
        return array_field(obj, field);
    }

    nested_string(obj, field)
}

/// `[*]` array access: resolve the prefix path to an array, extract the
/// suffix path from every element, join with commas.
fn array_field(obj: &Value, field: &str) -> String {
    let Some((array_path, sub_path)) = field.split_once("[*]") else {
        return String::new();
    };
    let sub_path = sub_path.trim_start_matches('.');
    let Some(arr) = nested_value(obj, array_path).and_then(Value::as_array) else {
        return String::new();
    };

    let mut values = Vec::new();
    for item in arr {
        if !item.is_object() || sub_path.is_empty() {
            continue;
        }
        let v = nested_string(item, sub_path);
        if !v.is_empty() {
            values.push(v);
        }
    }
    values.join(",")
}

/// Filtered array access like `.status.conditions[?(@.type=="Ready")].status`:
/// first element whose filter field equals the literal wins.
fn filtered_array_field(obj: &Value, field: &str) -> String {
    let Some(bracket) = field.find("[?(") else {
        return String::new();
    };
    let array_path = &field[..bracket];
    let remaining = &field[bracket..];
    let Some(end) = remaining.find(")]") else {
        return String::new();
    };
    let filter_expr = &remaining[3..end];
    let field_after = remaining[end + 2..].trim_start_matches('.');

    let Some((lhs, rhs)) = filter_expr.split_once("==") else {
        return String::new();
    };
    let filter_field = lhs.trim_start_matches("@.");
    let filter_value = rhs.trim_matches('"');

    let Some(arr) = nested_value(obj, array_path).and_then(Value::as_array) else {
        return String::new();
    };

    for item in arr {
        if !item.is_object() {
            continue;
        }
        if nested_string(item, filter_field) == filter_value {
            if field_after.is_empty() {
                return display_value(item);
            }
            return nested_string(item, field_after);
        }
    }
    String::new()
}

/// Compact age rendering: `45s`, `12m`, `7h`, `3d`, `2M`, `1y`. Unknown
/// timestamps render as `<unknown>`.
pub fn render_age(ts: Option<DateTime<Utc>>) -> String {
    let Some(ts) = ts else {
        return "<unknown>".to_string();
    };
    let secs = (Utc::now() - ts).num_seconds().max(0);
    if secs < 60 {
        return format!("{}s", secs);
    }
    if secs < 3600 {
        return format!("{}m", secs / 60);
    }
    if secs < 86_400 {
        return format!("{}h", secs / 3600);
    }
    let days = secs / 86_400;
    if days < 30 {
        return format!("{}d", days);
    }
    if days < 365 {
        return format!("{}M", days / 30);
    }
    format!("{}y", days / 365)
}
