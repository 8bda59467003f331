//! Runtime settings of a job
//!
//! Tag, backend, parallelism and variable values can be given on the job
//! itself, in the ad-hoc `configData.runtime` block, or in the persisted
//! configuration. These are the typed shapes for all three sources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ValidationError};
use crate::normalize;

/// Execution target descriptor
///
/// Older records carry only `type` and `containerType`; `context` is then `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    #[serde(rename = "type", default, deserialize_with = "normalize::optional_id")]
    pub backend_type: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub container_type: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub context: Option<String>,
}

impl Backend {
    pub fn new(
        backend_type: Option<String>,
        container_type: Option<String>,
        context: Option<String>,
    ) -> Self {
        Self {
            backend_type,
            container_type,
            context,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.backend_type.is_none() && self.container_type.is_none() && self.context.is_none()
    }
}

/// Row-level parallelism of a container job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// Fixed number of parallel rows, `0..=100`
    Count(u32),
    /// No limit
    Infinity,
}

impl Parallelism {
    pub const MAX: u32 = 100;
    const INFINITY: &'static str = "infinity";

    /// Parse from a JSON value; `null` and `""` mean "not set"
    pub fn from_value(value: &Value, path: &str) -> Result<Option<Self>> {
        let raw = match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => return Err(ValidationError::invalid_type(path, "string", other)),
        };
        if raw == Self::INFINITY {
            return Ok(Some(Parallelism::Infinity));
        }
        match raw.parse::<u32>() {
            Ok(count) if count <= Self::MAX => Ok(Some(Parallelism::Count(count))),
            _ => Err(ValidationError::NotAllowed {
                path: path.to_string(),
                value: raw,
                allowed: "\"0\" to \"100\", \"infinity\"".to_string(),
            }),
        }
    }

    /// Whether this value turns the job into a row container
    pub fn is_parallel(self) -> bool {
        match self {
            Parallelism::Count(count) => count > 0,
            Parallelism::Infinity => true,
        }
    }

    pub fn as_string(self) -> String {
        match self {
            Parallelism::Count(count) => count.to_string(),
            Parallelism::Infinity => Self::INFINITY.to_string(),
        }
    }
}

/// serde adapter for `Option<Parallelism>`; serialized as a string
pub mod parallelism {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Parallelism>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.as_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Parallelism>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
        Parallelism::from_value(&value, "job.parallelism").map_err(serde::de::Error::custom)
    }
}

/// A single variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableValue {
    pub name: String,
    #[serde(default, deserialize_with = "normalize::string")]
    pub value: String,
}

/// Inline variable values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableValuesData {
    #[serde(default)]
    pub values: Vec<VariableValue>,
}

impl VariableValuesData {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Variable values: a stored reference or inline data, never both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVariableValues")]
pub struct VariableValues {
    #[serde(rename = "variableValuesId")]
    id: Option<String>,
    #[serde(rename = "variableValuesData")]
    data: VariableValuesData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariableValues {
    #[serde(default, deserialize_with = "normalize::optional_id")]
    variable_values_id: Option<String>,
    #[serde(default)]
    variable_values_data: Option<Value>,
}

impl TryFrom<RawVariableValues> for VariableValues {
    type Error = ValidationError;

    fn try_from(raw: RawVariableValues) -> Result<Self> {
        let data = parse_data(raw.variable_values_data.unwrap_or(Value::Null), "job")?;
        VariableValues::new(raw.variable_values_id, data, "job")
    }
}

impl VariableValues {
    const ID_KEY: &'static str = "variableValuesId";
    const DATA_KEY: &'static str = "variableValuesData";

    /// Build variable values, rejecting a non-empty id together with non-empty data
    pub fn new(id: Option<String>, data: VariableValuesData, path: &str) -> Result<Self> {
        let id = id.filter(|id| !id.is_empty());
        if id.is_some() && !data.is_empty() {
            return Err(ValidationError::ExclusiveFields {
                path: path.to_string(),
                first: Self::ID_KEY.to_string(),
                second: Self::DATA_KEY.to_string(),
            });
        }
        Ok(Self { id, data })
    }

    /// Read `variableValuesId` / `variableValuesData` from a data mapping
    ///
    /// `path` names the mapping in error messages, e.g. `configData`.
    pub fn from_data(data: &Map<String, Value>, path: &str) -> Result<Self> {
        let id = match data.get(Self::ID_KEY) {
            None => None,
            Some(value) => normalize::scalar(value).map_err(|actual| ValidationError::InvalidType {
                path: format!("{path}.{}", Self::ID_KEY),
                expected: "scalar".to_string(),
                actual: actual.to_string(),
            })?,
        };
        let values = parse_data(data.get(Self::DATA_KEY).cloned().unwrap_or(Value::Null), path)?;
        Self::new(id, values, path)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn data(&self) -> &VariableValuesData {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.data.is_empty()
    }

    /// Record fields this value contributes to a job
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            Self::ID_KEY.to_string(),
            self.id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        fields.insert(
            Self::DATA_KEY.to_string(),
            serde_json::to_value(&self.data).unwrap_or_else(|_| Value::Object(Map::new())),
        );
        fields
    }
}

fn parse_data(value: Value, path: &str) -> Result<VariableValuesData> {
    let data_path = format!("{path}.{}", VariableValues::DATA_KEY);
    let map = normalize::as_object(value).map_err(|actual| ValidationError::InvalidType {
        path: data_path.clone(),
        expected: "object".to_string(),
        actual: actual.to_string(),
    })?;
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ValidationError::invalid_value(data_path, e.to_string()))
}

/// Runtime block of a configuration (`configData.runtime` or the persisted
/// configuration's `runtime`)
///
/// Unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub tag: Option<String>,
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default, with = "parallelism")]
    pub parallelism: Option<Parallelism>,
}

impl RuntimeSettings {
    const KEY: &'static str = "runtime";

    /// Read and validate the `runtime` block of a data mapping
    pub fn from_data(data: &Map<String, Value>, path: &str) -> Result<Self> {
        let runtime_path = format!("{path}.{}", Self::KEY);
        let Some(value) = data.get(Self::KEY) else {
            return Ok(Self::default());
        };
        let map = normalize::as_object(value.clone()).map_err(|actual| ValidationError::InvalidType {
            path: runtime_path.clone(),
            expected: "object".to_string(),
            actual: actual.to_string(),
        })?;
        serde_json::from_value(Value::Object(map))
            .map_err(|e| ValidationError::invalid_value(runtime_path, e.to_string()))
    }

    /// Backend if present and non-empty
    pub fn non_empty_backend(&self) -> Option<&Backend> {
        self.backend.as_ref().filter(|backend| !backend.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_backend_empty() {
        assert!(Backend::default().is_empty());
        assert!(!Backend::new(Some("small".into()), None, None).is_empty());

        let legacy: Backend = serde_json::from_value(json!({"type": "large", "containerType": ""})).unwrap();
        assert_eq!(legacy.backend_type.as_deref(), Some("large"));
        assert_eq!(legacy.container_type, None);
        assert_eq!(legacy.context, None);
    }

    #[test]
    fn test_parallelism_values() {
        assert_eq!(Parallelism::from_value(&json!("5"), "p").unwrap(), Some(Parallelism::Count(5)));
        assert_eq!(Parallelism::from_value(&json!(3), "p").unwrap(), Some(Parallelism::Count(3)));
        assert_eq!(Parallelism::from_value(&json!("infinity"), "p").unwrap(), Some(Parallelism::Infinity));
        assert_eq!(Parallelism::from_value(&json!(""), "p").unwrap(), None);
        assert!(Parallelism::from_value(&json!("101"), "p").is_err());
        assert!(Parallelism::from_value(&json!("many"), "p").is_err());

        assert!(Parallelism::Count(1).is_parallel());
        assert!(Parallelism::Infinity.is_parallel());
        assert!(!Parallelism::Count(0).is_parallel());
    }

    #[test]
    fn test_variable_values_exclusive() {
        let data = VariableValuesData {
            values: vec![VariableValue {
                name: "a".into(),
                value: "1".into(),
            }],
        };

        assert!(VariableValues::new(Some("123".into()), data.clone(), "job").is_err());
        assert!(VariableValues::new(Some("123".into()), VariableValuesData::default(), "job").is_ok());
        assert!(VariableValues::new(None, data, "job").is_ok());
        assert!(VariableValues::new(None, VariableValuesData::default(), "job").unwrap().is_empty());
        // an empty id does not count as set
        assert!(VariableValues::new(Some(String::new()), VariableValuesData::default(), "job").unwrap().is_empty());
    }

    #[test]
    fn test_variable_values_from_data() {
        let values = VariableValues::from_data(
            &map(json!({"variableValuesData": {"values": [{"name": "x", "value": 1}]}})),
            "configData",
        )
        .unwrap();
        assert_eq!(values.data().values[0].value, "1");
        assert_eq!(values.id(), None);

        let err = VariableValues::from_data(&map(json!({"variableValuesData": "nope"})), "configData").unwrap_err();
        assert_eq!(err.path(), Some("configData.variableValuesData"));
    }

    #[test]
    fn test_variable_values_serde_flatten_fields() {
        let values: VariableValues = serde_json::from_value(json!({"variableValuesId": 77})).unwrap();
        assert_eq!(values.id(), Some("77"));
        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            json!({"variableValuesId": "77", "variableValuesData": {"values": []}})
        );
        assert!(
            serde_json::from_value::<VariableValues>(json!({
                "variableValuesId": "1",
                "variableValuesData": {"values": [{"name": "a", "value": "b"}]}
            }))
            .is_err()
        );
    }

    #[test]
    fn test_runtime_settings_strips_unknown_keys() {
        let settings = RuntimeSettings::from_data(
            &map(json!({"runtime": {"tag": "1.0.0", "safe": true, "backend": {"type": "small"}}})),
            "configData",
        )
        .unwrap();
        assert_eq!(settings.tag.as_deref(), Some("1.0.0"));
        assert_eq!(settings.non_empty_backend().unwrap().backend_type.as_deref(), Some("small"));

        assert_eq!(RuntimeSettings::from_data(&Map::new(), "configData").unwrap(), RuntimeSettings::default());
        let err = RuntimeSettings::from_data(&map(json!({"runtime": "fast"})), "configData").unwrap_err();
        assert_eq!(err.path(), Some("configData.runtime"));
    }
}
