//! Data plane configuration
//!
//! A project may be routed to at most one data plane: a separate execution
//! and key-management environment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// Execution plane a project's jobs may run in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPlaneConfig {
    pub id: String,
    pub kubernetes: KubernetesConfig,
    pub encryption: EncryptionConfig,
}

/// Connection parameters of the data plane's cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    pub api_url: String,
    /// Encrypted with the generic (non-job) encryption
    #[serde(rename = "#token")]
    pub token: String,
    pub certificate_authority: String,
    pub namespace: String,
}

/// Key material used to encrypt job payloads of this data plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EncryptionConfig {
    #[serde(rename = "aws")]
    AwsKms(AwsKmsConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsKmsConfig {
    pub stack_id: String,
    pub kms_region: String,
    pub kms_key_id: String,
    #[serde(default)]
    pub kms_role_arn: Option<String>,
}

impl DataPlaneConfig {
    /// Validate a data plane directory response
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ValidationError::invalid_value("dataPlane", e.to_string()))
    }
}
