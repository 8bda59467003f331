//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::job_type::JobType;
use crate::domain::runtime::{Backend, Parallelism, VariableValues};
use crate::normalize;
use crate::timestamp;

string_enum! {
    /// Job lifecycle status
    pub enum JobStatus at "job.status" {
        Created => "created",
        Waiting => "waiting",
        Processing => "processing",
        Terminating => "terminating",
        Success => "success",
        Error => "error",
        Warning => "warning",
        Terminated => "terminated",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// Statuses a job never leaves
    pub const FINISHED: &'static [JobStatus] = &[
        JobStatus::Success,
        JobStatus::Error,
        JobStatus::Warning,
        JobStatus::Terminated,
        JobStatus::Cancelled,
    ];

    pub fn is_finished(self) -> bool {
        Self::FINISHED.contains(&self)
    }
}

string_enum! {
    /// Status the job is being driven towards
    pub enum DesiredStatus at "job.desiredStatus" {
        Processing => "processing",
        Terminating => "terminating",
    }
}

string_enum! {
    /// Run mode requested for the job
    pub enum Mode at "job.mode" {
        Run => "run",
        Debug => "debug",
        ForceRun => "forceRun",
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Run
    }
}

string_enum! {
    /// Development branch context of a job
    pub enum BranchType at "job.branchType" {
        Default => "default",
        Dev => "dev",
    }
}

string_enum! {
    /// Execution backend kind
    pub enum Executor at "job.executor" {
        Dind => "dind",
        K8sContainers => "k8sContainers",
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::Dind
    }
}

string_enum! {
    /// What happens to an orchestration when a task fails
    pub enum OnErrorBehavior at "job.behavior.onError" {
        Stop => "stop",
        Warning => "warning",
    }
}

/// Job behavior flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    #[serde(default)]
    pub on_error: Option<OnErrorBehavior>,
}

/// Full job record
///
/// This is the validated, resolved shape stored by the Queue API. Values
/// are immutable once built: changes go through the job factory, which
/// re-validates the patched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    #[serde(deserialize_with = "normalize::required_id")]
    pub id: String,
    #[serde(deserialize_with = "normalize::required_id")]
    pub run_id: String,

    #[serde(deserialize_with = "normalize::required_id")]
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(deserialize_with = "normalize::required_id")]
    pub token_id: String,
    #[serde(default)]
    pub token_description: String,
    /// Encrypted storage token
    #[serde(rename = "#tokenString")]
    pub token_string: String,

    #[serde(deserialize_with = "normalize::required_id")]
    pub component_id: String,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub config_id: Option<String>,
    #[serde(default, deserialize_with = "normalize::id_list")]
    pub config_row_ids: Vec<String>,
    /// Ad-hoc configuration, possibly holding encrypted leaves
    #[serde(default, deserialize_with = "normalize::object")]
    pub config_data: Map<String, Value>,

    pub status: JobStatus,
    pub desired_status: DesiredStatus,
    /// Derived from `status`; recomputed on every load
    #[serde(default)]
    pub is_finished: bool,

    pub mode: Mode,
    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub tag: Option<String>,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default, with = "crate::domain::runtime::parallelism")]
    pub parallelism: Option<Parallelism>,
    #[serde(default)]
    pub executor: Executor,
    #[serde(rename = "type", default)]
    pub job_type: JobType,

    #[serde(default, deserialize_with = "normalize::optional_id")]
    pub branch_id: Option<String>,
    pub branch_type: BranchType,

    #[serde(flatten)]
    pub variable_values: VariableValues,

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
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::optional")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::optional")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::optional")]
    pub delayed_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,

    #[serde(default, deserialize_with = "normalize::object")]
    pub result: Map<String, Value>,
    #[serde(default, deserialize_with = "normalize::object")]
    pub usage_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(default)]
    pub behavior: Behavior,
}

impl JobData {
    /// Run id of the parent job, or an empty string for root jobs
    pub fn parent_run_id(&self) -> &str {
        parent_run_id(&self.run_id)
    }

    /// Serialize back into the wire record
    pub fn to_value(&self) -> Value {
        // Every field is plain data; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Strip the last dot-delimited segment of a run id
///
/// `"12.34.56"` → `"12.34"`, `"12"` → `""`.
pub fn parent_run_id(run_id: &str) -> &str {
    run_id.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("")
}
