//! Remote collaborators
//!
//! Traits for the services a job needs but this crate does not implement:
//! token verification, the component registry, the generic encryption
//! capability, privileged token issuance and the data-plane directory.
//! Callers inject implementations as `Arc<dyn _>`.

use std::sync::Arc;

use async_trait::async_trait;
use jobqueue_core::domain::data_plane::{DataPlaneConfig, EncryptionConfig};
use jobqueue_core::domain::job::BranchType;
use jobqueue_core::normalize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Project feature that requires branch-scoped encryption of job secrets
pub const PROTECTED_DEFAULT_BRANCH_FEATURE: &str = "protected-default-branch";

/// Token role that cannot run jobs
pub const READ_ONLY_ROLE: &str = "readOnly";

/// Owner details of a verified storage token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub project_id: String,
    pub project_name: String,
    pub token_id: String,
    pub token_description: String,
    #[serde(default)]
    pub features: Vec<String>,
    /// `Some(false)` when the verified branch is a development branch
    #[serde(default)]
    pub branch_is_default: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
    /// Components the token may run; `None` means any
    #[serde(default)]
    pub allowed_components: Option<Vec<String>>,
}

impl TokenInfo {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Fail unless this token may run jobs of `component_id`
    pub fn ensure_can_run(&self, component_id: &str) -> Result<()> {
        if self.role.as_deref() == Some(READ_ONLY_ROLE) {
            return Err(ClientError::PermissionDenied(
                "Read-only token cannot run jobs".to_string(),
            ));
        }
        if let Some(allowed) = &self.allowed_components {
            if !allowed.iter().any(|c| c == component_id) {
                return Err(ClientError::PermissionDenied(format!(
                    "Token is not allowed to run component \"{component_id}\""
                )));
            }
        }
        Ok(())
    }
}

/// Verifies storage tokens and hands out ids
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Verify `token`, optionally in the context of a development branch
    async fn verify_token(&self, token: &str, branch_id: Option<&str>) -> Result<TokenInfo>;

    /// Generate a new job id
    async fn generate_id(&self, token: &str) -> Result<String>;
}

/// Component definitions and persisted configurations
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    async fn get_component(&self, component_id: &str) -> Result<Value>;

    /// Persisted configuration, as returned by the registry
    async fn get_configuration(
        &self,
        component_id: &str,
        config_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Value>;
}

/// Body of a persisted configuration response
///
/// The registry wraps the user-editable part in a `configuration` key.
pub fn configuration_body(configuration: &Value) -> Result<Map<String, Value>> {
    let body = configuration.get("configuration").cloned().unwrap_or(Value::Null);
    normalize::as_object(body).map_err(|actual| {
        ClientError::Validation(jobqueue_core::ValidationError::InvalidType {
            path: "configuration".to_string(),
            expected: "object".to_string(),
            actual: actual.to_string(),
        })
    })
}

/// Generic object encryption capability
///
/// Payloads are JSON values; every string leaf that needs protecting is
/// replaced by its cipher.
#[async_trait]
pub trait ObjectEncryptor: Send + Sync {
    async fn encrypt_for_project(&self, data: Value, component_id: &str, project_id: &str) -> Result<Value>;

    async fn encrypt_for_branch_type(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        branch_type: BranchType,
    ) -> Result<Value>;

    async fn decrypt_for_branch_type(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        branch_type: BranchType,
    ) -> Result<Value>;

    async fn decrypt_for_branch_type_configuration(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        config_id: &str,
        branch_type: BranchType,
    ) -> Result<Value>;

    /// Encryption not bound to any project, for deployment secrets
    async fn encrypt_generic(&self, data: Value) -> Result<Value>;

    async fn decrypt_generic(&self, data: Value) -> Result<Value>;
}

/// Builds an encryption capability for a data plane's key material
#[async_trait]
pub trait ObjectEncryptorProvider: Send + Sync {
    async fn encryptor(&self, config: &EncryptionConfig) -> Result<Arc<dyn ObjectEncryptor>>;
}

/// Parameters of a short-lived privileged token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegedTokenRequest {
    pub project_id: String,
    pub description: String,
    pub can_manage_protected_default_branch: bool,
    pub can_create_jobs: bool,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Mints privileged tokens
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self, application_token: &str, request: &PrivilegedTokenRequest) -> Result<String>;
}

/// Directory of data planes
#[async_trait]
pub trait DataPlaneDirectory: Send + Sync {
    /// Data plane of a project, if it has one
    async fn project_data_plane(&self, project_id: &str) -> Result<Option<DataPlaneConfig>>;

    /// Data plane by id; an unknown id is a "not found" error
    async fn get_data_plane(&self, data_plane_id: &str) -> Result<DataPlaneConfig>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_can_run() {
        let mut info = TokenInfo::default();
        assert!(info.ensure_can_run("keboola.ex-db").is_ok());

        info.allowed_components = Some(vec!["keboola.orchestrator".into()]);
        let err = info.ensure_can_run("keboola.ex-db").unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));
        assert!(info.ensure_can_run("keboola.orchestrator").is_ok());

        info.role = Some(READ_ONLY_ROLE.into());
        assert!(info.ensure_can_run("keboola.orchestrator").unwrap_err().is_permission_error());
    }

    #[test]
    fn test_configuration_body() {
        let body = configuration_body(&json!({"id": "1", "configuration": {"runtime": {}}})).unwrap();
        assert!(body.contains_key("runtime"));

        assert!(configuration_body(&json!({"id": "1"})).unwrap().is_empty());
        assert!(configuration_body(&json!({"configuration": "x"})).is_err());
    }
}
