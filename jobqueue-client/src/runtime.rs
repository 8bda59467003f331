//! Runtime settings resolution
//!
//! The effective tag, backend, parallelism and variable values of a job come
//! from, in order of priority:
//!
//! 1. the job itself
//! 2. the ad-hoc `configData.runtime` block (and `configData` variables)
//! 3. the persisted configuration, fetched at most once per resolve call
//! 4. for the tag only, the component's default image tag

use std::sync::Arc;

use jobqueue_core::domain::component::ComponentSpecification;
use jobqueue_core::domain::job::JobData;
use jobqueue_core::domain::runtime::{Backend, Parallelism, RuntimeSettings, VariableValues};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Result, ResultExt};
use crate::services::{ComponentRegistry, configuration_body};

/// Resolved runtime fields of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimePatch {
    pub tag: Option<String>,
    pub backend: Backend,
    pub parallelism: Option<Parallelism>,
    pub variable_values: VariableValues,
}

impl RuntimePatch {
    /// Record fields of this patch, in the job record's wire shape
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = self.variable_values.to_fields();
        fields.insert("tag".to_string(), self.tag.map(Value::String).unwrap_or(Value::Null));
        fields.insert(
            "backend".to_string(),
            serde_json::to_value(&self.backend).unwrap_or_else(|_| Value::Object(Map::new())),
        );
        fields.insert(
            "parallelism".to_string(),
            self.parallelism
                .map(|p| Value::String(p.as_string()))
                .unwrap_or(Value::Null),
        );
        fields
    }

    /// Overwrite the runtime fields of a job record
    pub fn apply(self, record: &mut Map<String, Value>) {
        record.extend(self.into_fields());
    }
}

/// Resolves runtime settings against the component registry
#[derive(Clone)]
pub struct RuntimeSettingsResolver {
    registry: Arc<dyn ComponentRegistry>,
}

impl RuntimeSettingsResolver {
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the runtime settings of `job`
    ///
    /// A malformed `configData` fails with a validation error. Registry
    /// failures are wrapped with the component or configuration being
    /// loaded.
    pub async fn resolve(&self, job: &JobData) -> Result<RuntimePatch> {
        let config_data_runtime = RuntimeSettings::from_data(&job.config_data, "configData")?;
        let config_data_variables = VariableValues::from_data(&job.config_data, "configData")?;

        let persisted = PersistedConfiguration::new(self.registry.as_ref(), job);

        let tag = self.resolve_tag(job, &config_data_runtime, &persisted).await?;

        let variable_values = if !job.variable_values.is_empty() {
            job.variable_values.clone()
        } else if !config_data_variables.is_empty() {
            config_data_variables
        } else {
            persisted.variable_values().await?
        };

        let backend = if !job.backend.is_empty() {
            job.backend.clone()
        } else if let Some(backend) = config_data_runtime.non_empty_backend() {
            backend.clone()
        } else {
            persisted.runtime().await?.backend.clone().unwrap_or_default()
        };

        let parallelism = match job.parallelism.or(config_data_runtime.parallelism) {
            Some(parallelism) => Some(parallelism),
            None => persisted.runtime().await?.parallelism,
        };

        debug!(
            "Resolved runtime of job {}: tag={:?}, backend={:?}, parallelism={:?}",
            job.id, tag, backend, parallelism
        );

        Ok(RuntimePatch {
            tag,
            backend,
            parallelism,
            variable_values,
        })
    }

    async fn resolve_tag(
        &self,
        job: &JobData,
        config_data_runtime: &RuntimeSettings,
        persisted: &PersistedConfiguration<'_>,
    ) -> Result<Option<String>> {
        if let Some(tag) = job.tag.clone().or_else(|| config_data_runtime.tag.clone()) {
            return Ok(Some(tag));
        }
        if let Some(tag) = persisted.runtime().await?.tag.clone() {
            return Ok(Some(tag));
        }

        let component = self
            .registry
            .get_component(&job.component_id)
            .await
            .with_context(|| format!("Loading component \"{}\"", job.component_id))?;
        let component = ComponentSpecification::from_value(component)?;
        Ok(component.tag().map(str::to_string))
    }
}

/// Persisted configuration of the job being resolved, loaded on first use
struct PersistedConfiguration<'a> {
    registry: &'a dyn ComponentRegistry,
    job: &'a JobData,
    body: OnceCell<Map<String, Value>>,
    runtime: OnceCell<RuntimeSettings>,
}

impl<'a> PersistedConfiguration<'a> {
    fn new(registry: &'a dyn ComponentRegistry, job: &'a JobData) -> Self {
        Self {
            registry,
            job,
            body: OnceCell::new(),
            runtime: OnceCell::new(),
        }
    }

    /// Configuration body; empty when the job has no configuration
    async fn body(&self) -> Result<&Map<String, Value>> {
        self.body
            .get_or_try_init(|| async move {
                let Some(config_id) = self.job.config_id.as_deref() else {
                    return Ok(Map::new());
                };
                let configuration = self
                    .registry
                    .get_configuration(&self.job.component_id, config_id, self.job.branch_id.as_deref())
                    .await
                    .with_context(|| {
                        format!(
                            "Loading configuration \"{}\" of component \"{}\"",
                            config_id, self.job.component_id
                        )
                    })?;
                configuration_body(&configuration)
            })
            .await
    }

    async fn runtime(&self) -> Result<&RuntimeSettings> {
        self.runtime
            .get_or_try_init(|| async move {
                let body = self.body().await?;
                Ok(RuntimeSettings::from_data(body, "configuration")?)
            })
            .await
    }

    async fn variable_values(&self) -> Result<VariableValues> {
        Ok(VariableValues::from_data(self.body().await?, "configuration")?)
    }
}
