//! Validation errors for job records and related shapes
//!
//! Messages carry the offending path and value so callers can show them
//! verbatim or match on them.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for validation
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors raised while validating or normalising input data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value is not a member of a closed set
    #[error("The value \"{value}\" is not allowed for path \"{path}\". Permissible values: {allowed}")]
    NotAllowed {
        path: String,
        value: String,
        allowed: String,
    },

    /// Value has the wrong JSON type
    #[error("Invalid type for path \"{path}\". Expected \"{expected}\", but got \"{actual}\".")]
    InvalidType {
        path: String,
        expected: String,
        actual: String,
    },

    /// Required field is absent
    #[error("The child config \"{field}\" under \"{path}\" must be configured.")]
    MissingField { path: String, field: String },

    /// Value is present but unusable
    #[error("Invalid configuration for path \"{path}\": {reason}")]
    InvalidValue { path: String, reason: String },

    /// Two mutually exclusive fields are both set
    #[error(
        "Invalid configuration for path \"{path}\": provide either \"{first}\" or \"{second}\", but not both."
    )]
    ExclusiveFields {
        path: String,
        first: String,
        second: String,
    },

    /// Memory limit string with an unknown unit
    #[error("Memory limit \"{0}\" has an unrecognized format, expected a number followed by \"m\" or \"g\".")]
    InvalidMemoryLimit(String),

    /// Record could not be mapped onto its typed shape
    #[error("Invalid job data: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Create a "not allowed" error listing the permissible values
    pub fn not_allowed(path: impl Into<String>, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self::NotAllowed {
            path: path.into(),
            value: value.into(),
            allowed: allowed
                .iter()
                .map(|v| format!("\"{v}\""))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create an "invalid type" error for the given JSON value
    pub fn invalid_type(path: impl Into<String>, expected: &str, actual: &Value) -> Self {
        Self::InvalidType {
            path: path.into(),
            expected: expected.to_string(),
            actual: json_type_name(actual).to_string(),
        }
    }

    pub fn missing_field(path: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            path: path.into(),
            field: field.into(),
        }
    }

    pub fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Path the error refers to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotAllowed { path, .. }
            | Self::InvalidType { path, .. }
            | Self::MissingField { path, .. }
            | Self::InvalidValue { path, .. }
            | Self::ExclusiveFields { path, .. } => Some(path),
            Self::InvalidMemoryLimit(_) | Self::Malformed(_) => None,
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Name of a JSON value's type as shown in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
