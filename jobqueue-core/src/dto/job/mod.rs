//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::job::{Behavior, Executor, Mode};
use crate::domain::job_type::JobType;
use crate::domain::runtime::{Backend, Parallelism, VariableValues};
use crate::normalize;
use crate::timestamp;

/// Request to create a new job
///
/// Only the caller-controlled parameters; identity, ids and lifecycle fields
/// are filled in by the job factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJobData {
    /// Plain storage token of the caller
    #[serde(rename = "#tokenString", deserialize_with = "normalize::required_id")]
    pub token_string: String,
    #[serde(deserialize_with = "normalize::required_id")]
    pub component_id: String,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub config_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::id_list")]
    pub config_row_ids: Vec<String>,
    #[serde(default, deserialize_with = "normalize::object")]
    pub config_data: Map<String, Value>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub tag: Option<String>,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default, with = "crate::domain::runtime::parallelism")]
    pub parallelism: Option<Parallelism>,
    #[serde(default)]
    pub executor: Option<Executor>,
    /// Forces the job type, bypassing classification
    #[serde(rename = "type", default)]
    pub job_type: Option<JobType>,

    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub branch_id: Option<String>,
    #[serde(flatten)]
    pub variable_values: VariableValues,

    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub parent_run_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub orchestration_job_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub orchestration_task_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub orchestration_phase_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::optional_id_list")]
    pub only_orchestration_task_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub previous_job_id: Option<String>,
    #[serde(default, with = "timestamp::optional")]
    pub delayed_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub behavior: Behavior,
}

impl NewJobData {
    /// Minimal request for a component run
    pub fn new(token_string: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            token_string: token_string.into(),
            component_id: component_id.into(),
            config_id: None,
            config_row_ids: Vec::new(),
            config_data: Map::new(),
            mode: Mode::default(),
            tag: None,
            backend: Backend::default(),
            parallelism: None,
            executor: None,
            job_type: None,
            branch_id: None,
            variable_values: VariableValues::default(),
            parent_run_id: None,
            orchestration_job_id: None,
            orchestration_task_id: None,
            orchestration_phase_id: None,
            only_orchestration_task_ids: None,
            previous_job_id: None,
            delayed_start_time: None,
            behavior: Behavior::default(),
        }
    }

    pub fn with_config_id(mut self, config_id: impl Into<String>) -> Self {
        self.config_id = Some(config_id.into());
        self
    }

    pub fn with_config_data(mut self, config_data: Map<String, Value>) -> Self {
        self.config_data = config_data;
        self
    }

    pub fn with_parent_run_id(mut self, parent_run_id: impl Into<String>) -> Self {
        self.parent_run_id = Some(parent_run_id.into());
        self
    }

    pub fn with_branch_id(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    /// Serialize into the request body shape
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
