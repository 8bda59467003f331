//! Job value object
//!
//! A validated job record together with the collaborators needed to look at
//! it: decrypted views and remote lookups are computed on first use and
//! cached for the lifetime of the instance.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobqueue_core::domain::component::ComponentSpecification;
use jobqueue_core::domain::job::{
    Behavior, BranchType, DesiredStatus, Executor, JobData, JobStatus, Mode,
};
use jobqueue_core::domain::job_type::JobType;
use jobqueue_core::domain::runtime::{Backend, Parallelism, VariableValues};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{ClientError, Result, ResultExt};
use crate::factory::JobDependencies;
use crate::services::{PROTECTED_DEFAULT_BRANCH_FEATURE, PrivilegedTokenRequest};

/// Lifetime of privileged execution tokens, in seconds
pub const EXECUTION_TOKEN_TTL: u64 = 3600;

/// A resolved job
///
/// Immutable: changes go through [`crate::ExistingJobFactory::modify_job`],
/// which returns a new instance.
pub struct Job {
    data: JobData,
    deps: Arc<JobDependencies>,

    token_decrypted: OnceCell<String>,
    config_data_decrypted: OnceCell<Map<String, Value>>,
    component_specification: OnceCell<ComponentSpecification>,
    component_configuration: OnceCell<Map<String, Value>>,
    component_configuration_decrypted: OnceCell<Map<String, Value>>,
    project_features: OnceCell<Vec<String>>,
    execution_token: OnceCell<String>,
}

impl Job {
    pub(crate) fn new(data: JobData, deps: Arc<JobDependencies>) -> Self {
        Self {
            data,
            deps,
            token_decrypted: OnceCell::new(),
            config_data_decrypted: OnceCell::new(),
            component_specification: OnceCell::new(),
            component_configuration: OnceCell::new(),
            component_configuration_decrypted: OnceCell::new(),
            project_features: OnceCell::new(),
            execution_token: OnceCell::new(),
        }
    }

    /// Seed the project features when they are already known
    pub(crate) fn with_project_features(mut self, features: Vec<String>) -> Self {
        self.project_features = OnceCell::new_with(Some(features));
        self
    }

    // =============================================================================
    // Record Accessors
    // =============================================================================

    pub fn data(&self) -> &JobData {
        &self.data
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn run_id(&self) -> &str {
        &self.data.run_id
    }

    /// Run id of the parent job, empty for root jobs
    pub fn parent_run_id(&self) -> &str {
        self.data.parent_run_id()
    }

    pub fn project_id(&self) -> &str {
        &self.data.project_id
    }

    pub fn project_name(&self) -> &str {
        &self.data.project_name
    }

    pub fn token_id(&self) -> &str {
        &self.data.token_id
    }

    pub fn token_description(&self) -> &str {
        &self.data.token_description
    }

    /// Encrypted storage token
    pub fn token_string(&self) -> &str {
        &self.data.token_string
    }

    pub fn component_id(&self) -> &str {
        &self.data.component_id
    }

    pub fn config_id(&self) -> Option<&str> {
        self.data.config_id.as_deref()
    }

    pub fn config_row_ids(&self) -> &[String] {
        &self.data.config_row_ids
    }

    /// Configuration data as stored, possibly with encrypted values
    pub fn config_data(&self) -> &Map<String, Value> {
        &self.data.config_data
    }

    pub fn status(&self) -> JobStatus {
        self.data.status
    }

    pub fn desired_status(&self) -> DesiredStatus {
        self.data.desired_status
    }

    pub fn is_finished(&self) -> bool {
        self.data.is_finished
    }

    pub fn mode(&self) -> Mode {
        self.data.mode
    }

    pub fn tag(&self) -> Option<&str> {
        self.data.tag.as_deref()
    }

    pub fn backend(&self) -> &Backend {
        &self.data.backend
    }

    pub fn parallelism(&self) -> Option<Parallelism> {
        self.data.parallelism
    }

    pub fn executor(&self) -> Executor {
        self.data.executor
    }

    pub fn job_type(&self) -> JobType {
        self.data.job_type
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.data.branch_id.as_deref()
    }

    pub fn branch_type(&self) -> BranchType {
        self.data.branch_type
    }

    pub fn variable_values(&self) -> &VariableValues {
        &self.data.variable_values
    }

    pub fn orchestration_job_id(&self) -> Option<&str> {
        self.data.orchestration_job_id.as_deref()
    }

    pub fn orchestration_task_id(&self) -> Option<&str> {
        self.data.orchestration_task_id.as_deref()
    }

    pub fn orchestration_phase_id(&self) -> Option<&str> {
        self.data.orchestration_phase_id.as_deref()
    }

    pub fn only_orchestration_task_ids(&self) -> Option<&[String]> {
        self.data.only_orchestration_task_ids.as_deref()
    }

    pub fn previous_job_id(&self) -> Option<&str> {
        self.data.previous_job_id.as_deref()
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.data.created_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.data.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.data.end_time
    }

    pub fn delayed_start_time(&self) -> Option<DateTime<Utc>> {
        self.data.delayed_start_time
    }

    pub fn duration_seconds(&self) -> Option<u64> {
        self.data.duration_seconds
    }

    pub fn result(&self) -> &Map<String, Value> {
        &self.data.result
    }

    pub fn usage_data(&self) -> &Map<String, Value> {
        &self.data.usage_data
    }

    pub fn metrics(&self) -> Option<&Value> {
        self.data.metrics.as_ref()
    }

    pub fn behavior(&self) -> &Behavior {
        &self.data.behavior
    }

    /// Job record in its wire shape
    pub fn to_value(&self) -> Value {
        self.data.to_value()
    }

    // =============================================================================
    // Decrypted Views
    // =============================================================================

    /// Plain storage token
    pub async fn token_decrypted(&self) -> Result<&str> {
        self.token_decrypted
            .get_or_try_init(|| async move {
                let token = self
                    .decrypt(Value::String(self.data.token_string.clone()), None)
                    .await?;
                match token {
                    Value::String(token) => Ok(token),
                    _ => Err(ClientError::Encryption(format!(
                        "Token of job \"{}\" did not decrypt to a string",
                        self.data.id
                    ))),
                }
            })
            .await
            .map(String::as_str)
    }

    /// Configuration data with encrypted values decrypted
    pub async fn config_data_decrypted(&self) -> Result<&Map<String, Value>> {
        self.config_data_decrypted
            .get_or_try_init(|| async move {
                let data = Value::Object(self.data.config_data.clone());
                let decrypted = self.decrypt(data, self.config_id()).await?;
                self.expect_object(decrypted, "configData")
            })
            .await
    }

    /// Persisted configuration with encrypted values decrypted
    pub async fn component_configuration_decrypted(&self) -> Result<&Map<String, Value>> {
        self.component_configuration_decrypted
            .get_or_try_init(|| async move {
                let configuration = Value::Object(self.component_configuration().await?.clone());
                let decrypted = self.decrypt(configuration, self.config_id()).await?;
                self.expect_object(decrypted, "configuration")
            })
            .await
    }

    async fn decrypt(&self, data: Value, config_id: Option<&str>) -> Result<Value> {
        self.deps
            .encryptor
            .decrypt(
                data,
                &self.data.component_id,
                &self.data.project_id,
                config_id,
                self.data.branch_type,
            )
            .await
    }

    fn expect_object(&self, value: Value, what: &str) -> Result<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ClientError::Encryption(format!(
                "Decrypted {what} of job \"{}\" is not an object",
                self.data.id
            ))),
        }
    }

    // =============================================================================
    // Remote Lookups
    // =============================================================================

    /// Registry definition of the job's component
    pub async fn component_specification(&self) -> Result<&ComponentSpecification> {
        self.component_specification
            .get_or_try_init(|| async move {
                let component = self
                    .deps
                    .registry
                    .get_component(&self.data.component_id)
                    .await
                    .with_context(|| format!("Loading component \"{}\"", self.data.component_id))?;
                Ok(ComponentSpecification::from_value(component)?)
            })
            .await
    }

    /// Persisted configuration of the job, as stored
    ///
    /// Empty when the job runs without a configuration.
    pub async fn component_configuration(&self) -> Result<&Map<String, Value>> {
        self.component_configuration
            .get_or_try_init(|| async move {
                let Some(config_id) = self.config_id() else {
                    return Ok(Map::new());
                };
                let configuration = self
                    .deps
                    .registry
                    .get_configuration(&self.data.component_id, config_id, self.branch_id())
                    .await
                    .with_context(|| {
                        format!(
                            "Loading configuration \"{}\" of component \"{}\"",
                            config_id, self.data.component_id
                        )
                    })?;
                match configuration {
                    Value::Object(map) => Ok(map),
                    other => Err(ClientError::ParseError(format!(
                        "Configuration \"{config_id}\" is not an object: {other}"
                    ))),
                }
            })
            .await
    }

    /// Enabled features of the owning project
    pub async fn project_features(&self) -> Result<&[String]> {
        self.project_features
            .get_or_try_init(|| async move {
                let token = self.token_decrypted().await?;
                let info = self
                    .deps
                    .identity
                    .verify_token(token, self.branch_id())
                    .await
                    .with_context(|| format!("Verifying token of job \"{}\"", self.data.id))?;
                Ok(info.features)
            })
            .await
            .map(Vec::as_slice)
    }

    /// Token the job should run with
    ///
    /// Jobs on the default branch of a project with a protected default branch
    /// get a short-lived privileged token; every other job runs with its own
    /// token.
    pub async fn execution_token(&self) -> Result<&str> {
        self.execution_token
            .get_or_try_init(|| async move {
                let protected = self
                    .project_features()
                    .await?
                    .iter()
                    .any(|f| f == PROTECTED_DEFAULT_BRANCH_FEATURE);

                if !protected || self.data.branch_type != BranchType::Default {
                    return Ok(self.token_decrypted().await?.to_string());
                }

                let privileged = self.deps.privileged_tokens.as_ref().ok_or_else(|| {
                    ClientError::ConfigError(
                        "Privileged token issuance is required for protected default branch jobs".to_string(),
                    )
                })?;

                debug!("Issuing privileged execution token for job {}", self.data.id);
                let request = PrivilegedTokenRequest {
                    project_id: self.data.project_id.clone(),
                    description: format!("[_internal] Execution of job {}", self.data.id),
                    can_manage_protected_default_branch: true,
                    can_create_jobs: true,
                    expires_in: EXECUTION_TOKEN_TTL,
                };
                privileged
                    .issuer
                    .issue_token(&privileged.application_token, &request)
                    .await
                    .with_context(|| format!("Issuing execution token for job \"{}\"", self.data.id))
            })
            .await
            .map(String::as_str)
    }
}

impl Serialize for Job {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.data.id)
            .field("run_id", &self.data.run_id)
            .field("project_id", &self.data.project_id)
            .field("component_id", &self.data.component_id)
            .field("config_id", &self.data.config_id)
            .field("status", &self.data.status)
            .field("type", &self.data.job_type)
            .finish_non_exhaustive()
    }
}
