//! In-memory collaborators and fixtures for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jobqueue_core::definition;
use jobqueue_core::domain::data_plane::{AwsKmsConfig, DataPlaneConfig, EncryptionConfig, KubernetesConfig};
use jobqueue_core::domain::job::{BranchType, JobData};
use serde_json::{Value, json};

use crate::encryption::JobObjectEncryptor;
use crate::error::{ClientError, Result};
use crate::factory::{ExistingJobFactory, JobDependencies, NewJobFactory};
use crate::services::{
    ComponentRegistry, DataPlaneDirectory, IdentityService, ObjectEncryptor, ObjectEncryptorProvider,
    PrivilegedTokenRequest, TokenInfo, TokenIssuer,
};

const PROJECT_PREFIX: &str = "KBC::ProjectSecure::";
const BRANCH_TYPE_PREFIX: &str = "KBC::BranchTypeSecure::";
const GENERIC_PREFIX: &str = "KBC::Secure::";

// =============================================================================
// Encryption
// =============================================================================

/// Prefixes plain values instead of encrypting them
///
/// A top-level string is encrypted as a whole; inside objects only values of
/// `#`-prefixed keys are.
#[derive(Default)]
pub struct FakeObjectEncryptor {
    calls: Mutex<Vec<String>>,
}

impl FakeObjectEncryptor {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn encrypt_value(value: Value, prefix: &str) -> Value {
    match value {
        Value::String(s) => Value::String(seal(s, prefix)),
        Value::Object(_) | Value::Array(_) => encrypt_nested(value, prefix),
        other => other,
    }
}

fn encrypt_nested(value: Value, prefix: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) if key.starts_with('#') => Value::String(seal(s, prefix)),
                        other => encrypt_nested(other, prefix),
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| encrypt_nested(v, prefix)).collect()),
        other => other,
    }
}

fn seal(plain: String, prefix: &str) -> String {
    if plain.starts_with("KBC::") {
        plain
    } else {
        format!("{prefix}{plain}")
    }
}

fn decrypt_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let plain = [PROJECT_PREFIX, BRANCH_TYPE_PREFIX, GENERIC_PREFIX]
                .iter()
                .find_map(|prefix| s.strip_prefix(prefix))
                .map(str::to_string)
                .unwrap_or(s);
            Value::String(plain)
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, decrypt_value(v))).collect()),
        Value::Array(items) => Value::Array(items.into_iter().map(decrypt_value).collect()),
        other => other,
    }
}

#[async_trait]
impl ObjectEncryptor for FakeObjectEncryptor {
    async fn encrypt_for_project(&self, data: Value, _component_id: &str, _project_id: &str) -> Result<Value> {
        self.record("encrypt_for_project".to_string());
        Ok(encrypt_value(data, PROJECT_PREFIX))
    }

    async fn encrypt_for_branch_type(
        &self,
        data: Value,
        _component_id: &str,
        _project_id: &str,
        branch_type: BranchType,
    ) -> Result<Value> {
        self.record(format!("encrypt_for_branch_type:{branch_type}"));
        Ok(encrypt_value(data, BRANCH_TYPE_PREFIX))
    }

    async fn decrypt_for_branch_type(
        &self,
        data: Value,
        _component_id: &str,
        _project_id: &str,
        branch_type: BranchType,
    ) -> Result<Value> {
        self.record(format!("decrypt_for_branch_type:{branch_type}"));
        Ok(decrypt_value(data))
    }

    async fn decrypt_for_branch_type_configuration(
        &self,
        data: Value,
        _component_id: &str,
        _project_id: &str,
        config_id: &str,
        branch_type: BranchType,
    ) -> Result<Value> {
        self.record(format!("decrypt_for_branch_type_configuration:{config_id}:{branch_type}"));
        Ok(decrypt_value(data))
    }

    async fn encrypt_generic(&self, data: Value) -> Result<Value> {
        self.record("encrypt_generic".to_string());
        Ok(encrypt_value(data, GENERIC_PREFIX))
    }

    async fn decrypt_generic(&self, data: Value) -> Result<Value> {
        self.record("decrypt_generic".to_string());
        Ok(decrypt_value(data))
    }
}

#[derive(Default)]
pub struct FakeEncryptorProvider {
    built: AtomicUsize,
}

impl FakeEncryptorProvider {
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectEncryptorProvider for FakeEncryptorProvider {
    async fn encryptor(&self, _config: &EncryptionConfig) -> Result<Arc<dyn ObjectEncryptor>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeObjectEncryptor::default()))
    }
}

// =============================================================================
// Data Planes
// =============================================================================

#[derive(Default)]
pub struct FakeDataPlaneDirectory {
    projects: HashMap<String, DataPlaneConfig>,
    data_planes: HashMap<String, DataPlaneConfig>,
    project_lookups: AtomicUsize,
}

impl FakeDataPlaneDirectory {
    pub fn with_project(mut self, project_id: &str, config: DataPlaneConfig) -> Self {
        self.data_planes.insert(config.id.clone(), config.clone());
        self.projects.insert(project_id.to_string(), config);
        self
    }

    pub fn with_data_plane(mut self, config: DataPlaneConfig) -> Self {
        self.data_planes.insert(config.id.clone(), config);
        self
    }

    pub fn project_lookups(&self) -> usize {
        self.project_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataPlaneDirectory for FakeDataPlaneDirectory {
    async fn project_data_plane(&self, project_id: &str) -> Result<Option<DataPlaneConfig>> {
        self.project_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.projects.get(project_id).cloned())
    }

    async fn get_data_plane(&self, data_plane_id: &str) -> Result<DataPlaneConfig> {
        self.data_planes
            .get(data_plane_id)
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("Data plane \"{data_plane_id}\" not found")))
    }
}

pub fn data_plane_config(id: &str) -> DataPlaneConfig {
    DataPlaneConfig {
        id: id.to_string(),
        kubernetes: KubernetesConfig {
            api_url: format!("https://{id}.k8s.example.com"),
            token: format!("{GENERIC_PREFIX}k8s-token"),
            certificate_authority: "---CA---".to_string(),
            namespace: "jobs".to_string(),
        },
        encryption: EncryptionConfig::AwsKms(AwsKmsConfig {
            stack_id: "stack".to_string(),
            kms_region: "eu-central-1".to_string(),
            kms_key_id: format!("alias/{id}"),
            kms_role_arn: None,
        }),
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
pub struct FakeRegistry {
    components: HashMap<String, Value>,
    configurations: HashMap<(String, String), Value>,
    component_fetches: AtomicUsize,
    configuration_fetches: AtomicUsize,
}

impl FakeRegistry {
    /// Register a component under its `id`
    pub fn with_component(mut self, component: Value) -> Self {
        let id = component["id"].as_str().unwrap_or_default().to_string();
        self.components.insert(id, component);
        self
    }

    pub fn with_configuration(mut self, component_id: &str, config_id: &str, configuration: Value) -> Self {
        self.configurations
            .insert((component_id.to_string(), config_id.to_string()), configuration);
        self
    }

    pub fn component_fetches(&self) -> usize {
        self.component_fetches.load(Ordering::SeqCst)
    }

    pub fn configuration_fetches(&self) -> usize {
        self.configuration_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentRegistry for FakeRegistry {
    async fn get_component(&self, component_id: &str) -> Result<Value> {
        self.component_fetches.fetch_add(1, Ordering::SeqCst);
        self.components
            .get(component_id)
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("Component \"{component_id}\" not found")))
    }

    async fn get_configuration(&self, component_id: &str, config_id: &str, _branch_id: Option<&str>) -> Result<Value> {
        self.configuration_fetches.fetch_add(1, Ordering::SeqCst);
        self.configurations
            .get(&(component_id.to_string(), config_id.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("Configuration \"{config_id}\" not found")))
    }
}

fn component(id: &str, tag: &str) -> Value {
    json!({
        "id": id,
        "data": {"definition": {"type": "aws-ecr", "uri": format!("keboola/{id}"), "tag": tag}}
    })
}

fn registry() -> FakeRegistry {
    FakeRegistry::default()
        .with_component(component("keboola.ex-db", "0.0.1"))
        .with_component(component("keboola.runner-config-test", "1.2.3"))
        .with_component(component("keboola.orchestrator", "1.0.0"))
        .with_configuration(
            "keboola.ex-db",
            "456",
            json!({
                "id": "456",
                "name": "Database extractor",
                "configuration": {"parameters": {"host": "db", "#secret": "KBC::ProjectSecure::value"}}
            }),
        )
        .with_configuration(
            "keboola.runner-config-test",
            "789",
            json!({"id": "789", "configuration": {"parameters": {"operation": "dump-config"}}}),
        )
        .with_configuration(
            "keboola.orchestrator",
            "900",
            json!({"id": "900", "configuration": {"tasks": [{"id": "T1"}]}}),
        )
}

// =============================================================================
// Identity and Tokens
// =============================================================================

pub struct FakeIdentity {
    token_info: TokenInfo,
    generated_id: String,
    verifications: AtomicUsize,
    generated: AtomicUsize,
}

impl FakeIdentity {
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn verify_token(&self, token: &str, _branch_id: Option<&str>) -> Result<TokenInfo> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if token == "expired" {
            return Err(ClientError::api_error(401, "Invalid access token"));
        }
        Ok(self.token_info.clone())
    }

    async fn generate_id(&self, _token: &str) -> Result<String> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(self.generated_id.clone())
    }
}

#[derive(Default)]
pub struct FakeTokenIssuer {
    requests: Mutex<Vec<PrivilegedTokenRequest>>,
}

impl FakeTokenIssuer {
    pub fn requests(&self) -> Vec<PrivilegedTokenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenIssuer for FakeTokenIssuer {
    async fn issue_token(&self, _application_token: &str, request: &PrivilegedTokenRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("privileged-token".to_string())
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// A full set of fakes, wired into factories on demand
pub struct Fakes {
    pub encryptor: Arc<FakeObjectEncryptor>,
    pub registry: Arc<FakeRegistry>,
    pub identity: Arc<FakeIdentity>,
    pub token_issuer: Arc<FakeTokenIssuer>,
    token_info: TokenInfo,
    generated_id: String,
}

impl Fakes {
    pub fn new() -> Self {
        let token_info = TokenInfo {
            project_id: "219".to_string(),
            project_name: "Test project".to_string(),
            token_id: "8".to_string(),
            token_description: "test@example.com".to_string(),
            ..TokenInfo::default()
        };
        Self {
            encryptor: Arc::new(FakeObjectEncryptor::default()),
            registry: Arc::new(registry()),
            identity: Arc::new(identity(&token_info, "3001")),
            token_issuer: Arc::new(FakeTokenIssuer::default()),
            token_info,
            generated_id: "3001".to_string(),
        }
    }

    pub fn with_features(self, features: &[&str]) -> Self {
        self.with_token_info(|info| info.features = features.iter().map(|f| f.to_string()).collect())
    }

    /// Tokens are verified against a non-default branch
    pub fn with_dev_branch(self) -> Self {
        self.with_token_info(|info| info.branch_is_default = Some(false))
    }

    pub fn with_role(self, role: &str) -> Self {
        self.with_token_info(|info| info.role = Some(role.to_string()))
    }

    pub fn with_generated_id(mut self, id: &str) -> Self {
        self.generated_id = id.to_string();
        self.identity = Arc::new(identity(&self.token_info, id));
        self
    }

    fn with_token_info(mut self, update: impl FnOnce(&mut TokenInfo)) -> Self {
        update(&mut self.token_info);
        self.identity = Arc::new(identity(&self.token_info, &self.generated_id));
        self
    }

    pub fn deps(&self) -> Arc<JobDependencies> {
        Arc::new(
            JobDependencies::new(
                Arc::new(JobObjectEncryptor::new(self.encryptor.clone())),
                self.registry.clone(),
                self.identity.clone(),
            )
            .with_privileged_tokens(self.token_issuer.clone(), "application-token"),
        )
    }

    pub fn existing_factory(&self) -> ExistingJobFactory {
        ExistingJobFactory::new(self.deps())
    }

    pub fn new_factory(&self) -> NewJobFactory {
        NewJobFactory::new(self.deps())
    }
}

fn identity(token_info: &TokenInfo, generated_id: &str) -> FakeIdentity {
    FakeIdentity {
        token_info: token_info.clone(),
        generated_id: generated_id.to_string(),
        verifications: AtomicUsize::new(0),
        generated: AtomicUsize::new(0),
    }
}

// =============================================================================
// Records
// =============================================================================

/// A stored job record as the Queue API returns it
pub fn job_record(component_id: &str, config_id: Option<&str>) -> Value {
    json!({
        "id": "1001",
        "runId": "1001",
        "projectId": "219",
        "projectName": "Test project",
        "tokenId": "8",
        "tokenDescription": "test@example.com",
        "#tokenString": "KBC::ProjectSecure::token",
        "componentId": component_id,
        "configId": config_id,
        "configData": {},
        "status": "created",
        "desiredStatus": "processing",
        "mode": "run",
        "branchType": "default",
        "createdTime": "2024-03-01T10:00:00+00:00",
    })
}

pub fn job_data(component_id: &str, config_id: Option<&str>) -> JobData {
    definition::validate_job(job_record(component_id, config_id)).unwrap()
}
