//! Component specification
//!
//! Validated view of a component definition as returned by the component
//! registry.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ValidationError};
use crate::normalize;

const DEFAULT_MEMORY: &str = "256m";

/// Validated component definition
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpecification {
    id: String,
    component_type: Option<String>,
    name: Option<String>,
    image_uri: String,
    image_tag: Option<String>,
    memory: String,
    features: Vec<String>,
    staging_input: Option<String>,
    staging_output: Option<String>,
    logging_type: Option<String>,
}

#[derive(Deserialize)]
struct RawComponent {
    #[serde(deserialize_with = "normalize::required_id")]
    id: String,
    #[serde(rename = "type", default, deserialize_with = "normalize::optional_id")]
    component_type: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    name: Option<String>,
    #[serde(default)]
    features: Vec<String>,
    data: RawComponentData,
}

#[derive(Deserialize)]
struct RawComponentData {
    definition: RawImageDefinition,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    memory: Option<String>,
    #[serde(default)]
    staging_storage: Option<RawStagingStorage>,
    #[serde(default)]
    logging: Option<RawLogging>,
}

#[derive(Deserialize)]
struct RawImageDefinition {
    #[serde(deserialize_with = "normalize::required_id")]
    uri: String,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    tag: Option<String>,
}

#[derive(Deserialize)]
struct RawStagingStorage {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    output: Option<String>,
}

#[derive(Deserialize)]
struct RawLogging {
    #[serde(rename = "type", default)]
    logging_type: Option<String>,
}

impl ComponentSpecification {
    /// Validate a registry response
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawComponent = serde_json::from_value(value)
            .map_err(|e| ValidationError::invalid_value("component", e.to_string()))?;

        let memory = raw.data.memory.unwrap_or_else(|| DEFAULT_MEMORY.to_string());
        memory_to_bytes(&memory)?;

        let (staging_input, staging_output) = raw
            .data
            .staging_storage
            .map(|s| (s.input, s.output))
            .unwrap_or_default();

        Ok(Self {
            id: raw.id,
            component_type: raw.component_type,
            name: raw.name,
            image_uri: raw.data.definition.uri,
            image_tag: raw.data.definition.tag,
            memory,
            features: raw.features,
            staging_input,
            staging_output,
            logging_type: raw.data.logging.and_then(|l| l.logging_type),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn component_type(&self) -> Option<&str> {
        self.component_type.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image_uri(&self) -> &str {
        &self.image_uri
    }

    /// Default image tag
    pub fn tag(&self) -> Option<&str> {
        self.image_tag.as_deref()
    }

    /// Memory limit as written in the definition, e.g. `"256m"`
    pub fn memory_limit(&self) -> &str {
        &self.memory
    }

    pub fn memory_limit_bytes(&self) -> Result<u64> {
        memory_to_bytes(&self.memory)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn input_staging(&self) -> Option<&str> {
        self.staging_input.as_deref()
    }

    pub fn output_staging(&self) -> Option<&str> {
        self.staging_output.as_deref()
    }

    pub fn logging_type(&self) -> Option<&str> {
        self.logging_type.as_deref()
    }
}

/// Convert a memory limit like `"256m"` or `"10g"` to bytes
///
/// Units are decimal: `m` is 10^6 bytes, `g` is 10^9 bytes.
pub fn memory_to_bytes(limit: &str) -> Result<u64> {
    let invalid = || ValidationError::InvalidMemoryLimit(limit.to_string());

    let (number, multiplier) = if let Some(number) = limit.strip_suffix('m') {
        (number, 1_000_000)
    } else if let Some(number) = limit.strip_suffix('g') {
        (number, 1_000_000_000)
    } else {
        return Err(invalid());
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}
