//! Adapter (C3): raw third-party workflow payloads → canonical records.
//!
//! Each entity has a small declarative field table (raw path → canonical
//! path) plus an essential-fields contract. Missing essentials raise
//! `AppError::AdapterIncomplete` enumerating every missing canonical path at
//! once; missing optionals become `None`/empty rather than being
//! fabricated. The adapter is pure: the same raw payload always produces
//! the same canonical record.

mod organization;
mod profile;

pub use organization::adapt_organization;
pub use profile::adapt_profile;

use serde_json::Value;

/// Looks up a dotted path (`"location.city"`) inside a JSON object,
/// returning `None` if any segment is absent or not an object/array index.
/// Candidate paths are tried in order and the first hit wins — this is
/// what lets the field table tolerate the workflow service renaming a key
/// across its own versions without the adapter caring.
fn lookup<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    'outer: for path in paths {
        let mut current = value;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(v) => current = v,
                None => continue 'outer,
            }
        }
        if !current.is_null() {
            return Some(current);
        }
    }
    None
}

fn str_at(value: &Value, paths: &[&str]) -> Option<String> {
    lookup(value, paths)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn i64_at(value: &Value, paths: &[&str]) -> Option<i64> {
    lookup(value, paths).and_then(|v| {
        v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

fn u8_at(value: &Value, paths: &[&str]) -> Option<u8> {
    i64_at(value, paths).and_then(|n| u8::try_from(n).ok())
}

fn bool_at(value: &Value, paths: &[&str]) -> bool {
    lookup(value, paths).and_then(Value::as_bool).unwrap_or(false)
}

fn str_list_at(value: &Value, paths: &[&str]) -> Vec<String> {
    lookup(value, paths)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn array_at<'a>(value: &'a Value, paths: &[&str]) -> &'a [Value] {
    lookup(value, paths)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_tries_candidates_in_order() {
        let payload = json!({ "full_name": "Ada Lovelace" });
        assert_eq!(
            str_at(&payload, &["name", "full_name"]),
            Some("Ada Lovelace".to_string())
        );
    }

    #[test]
    fn lookup_returns_none_on_blank_string() {
        let payload = json!({ "full_name": "   " });
        assert_eq!(str_at(&payload, &["full_name"]), None);
    }

    #[test]
    fn nested_path_resolves() {
        let payload = json!({ "location": { "city": "Austin" } });
        assert_eq!(str_at(&payload, &["location.city"]), Some("Austin".to_string()));
    }
}
