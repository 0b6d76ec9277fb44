//! ElasticSearch compatibility transforms for audit event JSON.
//!
//! ElasticSearch reserves `_id` as document metadata and rejects JSON keys
//! containing period characters. Events destined for an
//! ElasticSearch-compatible pipeline are rewritten before serialization:
//! the `_id` field becomes [`EVENT_ID_FIELD`], and keys with periods have
//! them replaced by underscores, with the original names recorded under
//! [`NORMALIZED_FIELD`] so consumers can reverse the mapping.

use serde_json::{Map, Value};
use thiserror::Error;

/// Identifier field name events arrive with.
pub const CONTENT_ID_FIELD: &str = "_id";

/// Safe replacement for [`CONTENT_ID_FIELD`].
pub const EVENT_ID_FIELD: &str = "_eventId";

/// Reserved field carrying de-normalization metadata.
pub const NORMALIZED_FIELD: &str = "_normalized";

/// Field under [`NORMALIZED_FIELD`] mapping normalized key names back to the
/// originals.
pub const FIELD_NAMES_FIELD: &str = "fieldNames";

/// The event already carries the reserved [`NORMALIZED_FIELD`].
#[derive(Debug, Error)]
#[error("_normalized is a reserved audit event field")]
pub struct ReservedFieldError;

/// Renames a top-level object field; a no-op when `from` is absent or the
/// value is not an object.
pub fn rename_field(value: &mut Value, from: &str, to: &str) {
    if let Value::Object(map) = value {
        if let Some(field) = map.remove(from) {
            map.insert(to.to_string(), field);
        }
    }
}

/// Replaces periods in JSON keys with underscores, recursively.
///
/// When any key was rewritten, a `_normalized.fieldNames` object mapping the
/// rewritten names back to the originals is appended to the event.
pub fn normalize(value: &mut Value) -> Result<(), ReservedFieldError> {
    let Value::Object(root) = value else {
        return Ok(());
    };
    if root.contains_key(NORMALIZED_FIELD) {
        return Err(ReservedFieldError);
    }

    let mut renamed = Map::new();
    normalize_keys(root, &mut renamed);

    if !renamed.is_empty() {
        let mut metadata = Map::new();
        metadata.insert(FIELD_NAMES_FIELD.to_string(), Value::Object(renamed));
        root.insert(NORMALIZED_FIELD.to_string(), Value::Object(metadata));
    }
    Ok(())
}

fn normalize_keys(map: &mut Map<String, Value>, renamed: &mut Map<String, Value>) {
    let keys_with_periods: Vec<String> = map
        .keys()
        .filter(|key| key.contains('.'))
        .cloned()
        .collect();

    for key in keys_with_periods {
        if let Some(field) = map.remove(&key) {
            let normalized = key.replace('.', "_");
            renamed.insert(normalized.clone(), Value::String(key));
            map.insert(normalized, field);
        }
    }

    for field in map.values_mut() {
        match field {
            Value::Object(nested) => normalize_keys(nested, renamed),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(nested) = item {
                        normalize_keys(nested, renamed);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rename_moves_field_value() {
        let mut event = json!({"_id": "abc", "action": "login"});
        rename_field(&mut event, CONTENT_ID_FIELD, EVENT_ID_FIELD);
        assert_eq!(event, json!({"_eventId": "abc", "action": "login"}));
    }

    #[test]
    fn rename_is_noop_when_field_absent() {
        let mut event = json!({"action": "login"});
        rename_field(&mut event, CONTENT_ID_FIELD, EVENT_ID_FIELD);
        assert_eq!(event, json!({"action": "login"}));
    }

    #[test]
    fn normalize_rewrites_keys_and_records_originals() {
        let mut event = json!({"http.request": {"user.agent": "curl"}});
        normalize(&mut event).unwrap();
        assert_eq!(
            event,
            json!({
                "http_request": {"user_agent": "curl"},
                "_normalized": {
                    "fieldNames": {
                        "http_request": "http.request",
                        "user_agent": "user.agent",
                    }
                }
            })
        );
    }

    #[test]
    fn normalize_untouched_without_periods() {
        let mut event = json!({"action": "login", "nested": {"ok": true}});
        let original = event.clone();
        normalize(&mut event).unwrap();
        assert_eq!(event, original);
    }

    #[test]
    fn normalize_rejects_reserved_field() {
        let mut event = json!({"_normalized": {}});
        assert!(normalize(&mut event).is_err());
    }

    #[test]
    fn normalize_descends_into_arrays() {
        let mut event = json!({"entries": [{"a.b": 1}]});
        normalize(&mut event).unwrap();
        assert_eq!(
            event,
            json!({
                "entries": [{"a_b": 1}],
                "_normalized": {"fieldNames": {"a_b": "a.b"}}
            })
        );
    }
}
