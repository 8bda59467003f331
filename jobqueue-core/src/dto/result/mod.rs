//! Result, metrics and patch DTOs
//!
//! Payloads a running job sends back to the Queue API when it finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::job::{DesiredStatus, JobStatus};
use crate::timestamp;

string_enum! {
    /// Who is to blame for a failed job
    pub enum ErrorType at "result.error.type" {
        Application => "application",
        User => "user",
    }
}

/// Error part of a job result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<String>,
}

/// Table manifests of one side of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableList {
    #[serde(default)]
    pub tables: Vec<Value>,
}

/// Files the job exchanged through the artifacts storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default)]
    pub uploaded: Vec<Value>,
    #[serde(default)]
    pub downloaded: Vec<Value>,
}

/// Output side of a job result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultOutput {
    #[serde(default)]
    pub tables: Vec<Value>,
    #[serde(default)]
    pub artifacts: Artifacts,
}

/// Result of a finished job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    /// Docker images used, one list per container
    #[serde(default)]
    pub images: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    #[serde(default)]
    pub input: TableList,
    #[serde(default)]
    pub output: ResultOutput,
}

impl JobResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_config_version(mut self, version: impl Into<String>) -> Self {
        self.config_version = Some(version.into());
        self
    }

    pub fn with_images(mut self, images: Vec<Value>) -> Self {
        self.images = images;
        self
    }

    pub fn with_error(mut self, error_type: ErrorType, exception_id: Option<String>) -> Self {
        self.error = Some(ResultError {
            error_type,
            exception_id,
        });
        self
    }

    pub fn with_input_tables(mut self, tables: Vec<Value>) -> Self {
        self.input.tables = tables;
        self
    }

    pub fn with_output_tables(mut self, tables: Vec<Value>) -> Self {
        self.output.tables = tables;
        self
    }

    pub fn with_artifacts(mut self, uploaded: Vec<Value>, downloaded: Vec<Value>) -> Self {
        self.output.artifacts = Artifacts { uploaded, downloaded };
        self
    }

    /// Wire representation, as stored in the job record's `result`
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Bytes moved through storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tables_bytes_sum: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tables_bytes_sum: Option<u64>,
}

/// Backend the job actually ran on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Execution metrics of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetrics {
    #[serde(default)]
    pub storage: StorageMetrics,
    #[serde(default)]
    pub backend: BackendMetrics,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_tables_bytes_sum(mut self, bytes: u64) -> Self {
        self.storage.input_tables_bytes_sum = Some(bytes);
        self
    }

    pub fn with_output_tables_bytes_sum(mut self, bytes: u64) -> Self {
        self.storage.output_tables_bytes_sum = Some(bytes);
        self
    }

    pub fn with_backend_size(mut self, size: impl Into<String>) -> Self {
        self.backend.size = Some(size.into());
        self
    }

    pub fn with_backend_container_size(mut self, size: impl Into<String>) -> Self {
        self.backend.container_size = Some(size.into());
        self
    }

    pub fn with_backend_context(mut self, context: impl Into<String>) -> Self {
        self.backend.context = Some(context.into());
        self
    }
}

/// Partial update of a job record
///
/// Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatchData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_status: Option<DesiredStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JobMetrics>,
    #[serde(
        default,
        with = "timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

impl JobPatchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_desired_status(mut self, desired_status: DesiredStatus) -> Self {
        self.desired_status = Some(desired_status);
        self
    }

    pub fn with_result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_usage_data(mut self, usage_data: Map<String, Value>) -> Self {
        self.usage_data = Some(usage_data);
        self
    }

    pub fn with_metrics(mut self, metrics: JobMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_start_time(mut self, time: DateTime<Utc>) -> Self {
        self.start_time = Some(time);
        self
    }

    pub fn with_end_time(mut self, time: DateTime<Utc>) -> Self {
        self.end_time = Some(time);
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Request body; unset fields are omitted
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}
