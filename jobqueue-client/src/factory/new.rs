//! Creating new jobs

use std::sync::Arc;

use jobqueue_core::definition;
use jobqueue_core::domain::job::{BranchType, DesiredStatus, JobStatus};
use jobqueue_core::domain::job_type;
use jobqueue_core::dto::job::NewJobData;
use serde_json::{Map, Value};
use tracing::info;

use super::{ExistingJobFactory, JobDependencies};
use crate::error::{ClientError, Result, ResultExt};
use crate::job::Job;
use crate::runtime::RuntimeSettingsResolver;
use crate::services::TokenInfo;

/// Builds new jobs from caller input
#[derive(Clone)]
pub struct NewJobFactory {
    deps: Arc<JobDependencies>,
    resolver: RuntimeSettingsResolver,
    existing: ExistingJobFactory,
}

impl NewJobFactory {
    pub fn new(deps: Arc<JobDependencies>) -> Self {
        Self {
            resolver: RuntimeSettingsResolver::new(deps.registry.clone()),
            existing: ExistingJobFactory::new(deps.clone()),
            deps,
        }
    }

    /// Create a job from typed input
    pub async fn create_job(&self, data: &NewJobData) -> Result<Job> {
        self.create_new_job(data.to_value()).await
    }

    /// Create a job from raw input
    ///
    /// The input is validated before any remote call. The token is then
    /// verified, a new id generated, runtime settings resolved and the job
    /// type derived. Token and configuration data are encrypted and the
    /// assembled record is validated against the full job schema.
    pub async fn create_new_job(&self, input: Value) -> Result<Job> {
        let data = definition::validate_new_job(input)?;

        let token = self.verify_token(&data).await?;
        token.ensure_can_run(&data.component_id)?;

        let id = self
            .deps
            .identity
            .generate_id(&data.token_string)
            .await
            .context("Generating job id")?;
        let run_id = match data.parent_run_id.as_deref() {
            Some(parent) => format!("{parent}.{id}"),
            None => id.clone(),
        };

        let branch_type = match (data.branch_id.as_deref(), token.branch_is_default) {
            (Some(_), Some(false)) => BranchType::Dev,
            _ => BranchType::Default,
        };

        let mut record = initial_record(&data, &token, &id, &run_id, branch_type);

        let provisional = self.existing.load_job(Value::Object(record.clone()))?;
        let patch = self.resolver.resolve(provisional.data()).await?;
        let parallelism = patch.parallelism;
        patch.apply(&mut record);

        let job_type = job_type::resolve(data.job_type, parallelism, &data.component_id, &data.config_data);
        record.insert("type".to_string(), Value::String(job_type.to_string()));

        let token_encrypted = self
            .deps
            .encryptor
            .encrypt(
                Value::String(data.token_string.clone()),
                &data.component_id,
                &token.project_id,
                Some(branch_type),
                &token.features,
            )
            .await?;
        let config_data_encrypted = self
            .deps
            .encryptor
            .encrypt(
                Value::Object(data.config_data.clone()),
                &data.component_id,
                &token.project_id,
                Some(branch_type),
                &token.features,
            )
            .await?;
        record.insert("#tokenString".to_string(), token_encrypted);
        record.insert("configData".to_string(), config_data_encrypted);
        strip_nulls(&mut record);

        let job = self
            .existing
            .load_job(Value::Object(record))?
            .with_project_features(token.features);

        info!(
            "Created job {} (run {}) of component {} as {}",
            job.id(),
            job.run_id(),
            job.component_id(),
            job.job_type()
        );
        Ok(job)
    }

    async fn verify_token(&self, data: &NewJobData) -> Result<TokenInfo> {
        match self
            .deps
            .identity
            .verify_token(&data.token_string, data.branch_id.as_deref())
            .await
        {
            Ok(info) => Ok(info),
            Err(ClientError::ApiError { status: 401 | 403, message }) => Err(ClientError::InvalidToken(message)),
            Err(e) => Err(e.context("Verifying token")),
        }
    }
}

/// Record of a new job before runtime resolution and encryption
fn initial_record(
    data: &NewJobData,
    token: &TokenInfo,
    id: &str,
    run_id: &str,
    branch_type: BranchType,
) -> Map<String, Value> {
    let mut record = match data.to_value() {
        Value::Object(record) => record,
        _ => Map::new(),
    };
    record.remove("parentRunId");

    let mut set = |key: &str, value: Value| {
        record.insert(key.to_string(), value);
    };
    set("id", Value::String(id.to_string()));
    set("runId", Value::String(run_id.to_string()));
    set("projectId", Value::String(token.project_id.clone()));
    set("projectName", Value::String(token.project_name.clone()));
    set("tokenId", Value::String(token.token_id.clone()));
    set("tokenDescription", Value::String(token.token_description.clone()));
    set("status", Value::String(JobStatus::Created.to_string()));
    set("desiredStatus", Value::String(DesiredStatus::Processing.to_string()));
    set(
        "executor",
        Value::String(data.executor.unwrap_or_default().to_string()),
    );
    set("branchType", Value::String(branch_type.to_string()));
    set("result", Value::Object(Map::new()));
    set("usageData", Value::Object(Map::new()));

    strip_nulls(&mut record);
    record
}

/// Unset fields are left out rather than sent as `null`
fn strip_nulls(record: &mut Map<String, Value>) {
    record.retain(|_, value| !value.is_null());
}
