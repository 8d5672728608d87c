//! Flattening of nested event documents into message fields

use serde_json::{Map, Value};

/// Separator between path segments of a flattened key.
pub const KEY_SEPARATOR: char = '_';

/// Flatten nested objects into `prefix_outer_inner` keys.
///
/// Dots in keys are replaced by the separator so downstream stores never see
/// them. Arrays and scalars are kept as values; nulls are dropped.
pub fn flatten(prefix: Option<&str>, map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(prefix.unwrap_or_default(), map, &mut out);
    out
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let key = sanitize_key(key);
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}{KEY_SEPARATOR}{key}")
        };

        match value {
            Value::Null => {}
            Value::Object(nested) => flatten_into(&name, nested, out),
            other => out.push((name, other.clone())),
        }
    }
}

/// Replace characters that are not valid in a field name.
pub fn sanitize_key(key: &str) -> String {
    key.replace('.', &KEY_SEPARATOR.to_string())
}
