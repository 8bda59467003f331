//! Normalisation of identifier-like scalars and object-shaped fields
//!
//! Every job shape (new job input, full record, runtime blocks) goes through
//! these helpers so creation-time and load-time records agree: non-empty
//! scalars become strings, empty ones become `None`, and `0` is kept as `"0"`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::json_type_name;

/// Normalise a scalar JSON value into an optional string
///
/// Returns `Err` with the offending type name for arrays and objects.
pub fn scalar(value: &Value) -> Result<Option<String>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(true) => Ok(Some("1".to_string())),
        Value::Bool(false) => Ok(None),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(json_type_name(value)),
    }
}

/// Whether a value is a non-empty scalar once normalised
pub fn is_present(value: Option<&Value>) -> bool {
    matches!(value.map(scalar), Some(Ok(Some(_))))
}

fn scalar_or_error<E: serde::de::Error>(value: &Value) -> Result<Option<String>, E> {
    scalar(value).map_err(|actual| E::custom(format!("expected a scalar value, got {actual}")))
}

/// `deserialize_with` helper for optional identifiers
pub fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => scalar_or_error(&value),
    }
}

/// `deserialize_with` helper for identifiers that must be present and non-empty
pub fn required_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_or_error(&value)?.ok_or_else(|| D::Error::custom("value must not be empty"))
}

/// `deserialize_with` helper for free-form scalar text; empty values become `""`
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(optional_id(deserializer)?.unwrap_or_default())
}

/// `deserialize_with` helper for lists of identifiers; empty entries are dropped
pub fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(optional_id_list(deserializer)?.unwrap_or_default())
}

/// Like [`id_list`] but keeps the distinction between "absent" and "empty"
pub fn optional_id_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in &items {
                if let Some(id) = scalar_or_error(item)? {
                    ids.push(id);
                }
            }
            Ok(Some(ids))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a list of identifiers, got {}",
            json_type_name(&other)
        ))),
    }
}

/// `deserialize_with` helper for object-shaped fields
///
/// `null` and an empty list are accepted as an empty object.
pub fn object<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(Map::new()),
        Some(value) => as_object(value).map_err(|actual| {
            D::Error::custom(format!("expected an object, got {actual}"))
        }),
    }
}

/// Convert a value into an object, accepting `null` and `[]` as empty
pub fn as_object(value: Value) -> Result<Map<String, Value>, &'static str> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        other => Err(json_type_name(&other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_normalisation() {
        assert_eq!(scalar(&json!("abc")), Ok(Some("abc".to_string())));
        assert_eq!(scalar(&json!(123)), Ok(Some("123".to_string())));
        assert_eq!(scalar(&json!(0)), Ok(Some("0".to_string())));
        assert_eq!(scalar(&json!("")), Ok(None));
        assert_eq!(scalar(&json!(null)), Ok(None));
        assert_eq!(scalar(&json!([1])), Err("array"));
    }

    #[test]
    fn test_is_present() {
        assert!(is_present(Some(&json!(0))));
        assert!(is_present(Some(&json!("0"))));
        assert!(!is_present(Some(&json!(""))));
        assert!(!is_present(None));
    }

    #[test]
    fn test_as_object_accepts_empty_list() {
        assert_eq!(as_object(json!([])), Ok(Map::new()));
        assert_eq!(as_object(json!([1])), Err("array"));
        assert_eq!(as_object(json!({"a": 1})).unwrap().len(), 1);
    }

    #[derive(Deserialize)]
    struct Ids {
        #[serde(default, deserialize_with = "optional_id")]
        id: Option<String>,
        #[serde(default, deserialize_with = "id_list")]
        rows: Vec<String>,
    }

    #[test]
    fn test_serde_helpers() {
        let ids: Ids = serde_json::from_value(json!({"id": 42, "rows": [1, "", "b"]})).unwrap();
        assert_eq!(ids.id.as_deref(), Some("42"));
        assert_eq!(ids.rows, vec!["1", "b"]);

        let ids: Ids = serde_json::from_value(json!({"id": ""})).unwrap();
        assert_eq!(ids.id, None);
        assert!(ids.rows.is_empty());

        assert!(serde_json::from_value::<Ids>(json!({"id": {"a": 1}})).is_err());
    }
}
