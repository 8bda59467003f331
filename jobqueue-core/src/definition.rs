//! Job definitions
//!
//! Validators that turn raw JSON into typed job shapes. Checks run in a fixed
//! order so the same bad input always yields the same error:
//!
//! 1. the value is an object
//! 2. required keys are present and non-empty
//! 3. closed enums hold permissible values
//! 4. object-shaped fields are objects
//! 5. runtime values (parallelism, variable values) are well formed
//! 6. timestamps parse
//! 7. the record maps onto its typed shape

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::domain::job::{BranchType, DesiredStatus, Executor, JobData, JobStatus, Mode, OnErrorBehavior};
use crate::domain::job_type::JobType;
use crate::domain::runtime::{Parallelism, VariableValues};
use crate::dto::job::NewJobData;
use crate::error::{Result, ValidationError};
use crate::normalize;
use crate::timestamp;

const ROOT: &str = "job";

const NEW_JOB_REQUIRED: &[&str] = &["#tokenString", "componentId"];

const JOB_REQUIRED: &[&str] = &[
    "id",
    "runId",
    "projectId",
    "tokenId",
    "#tokenString",
    "componentId",
    "status",
    "desiredStatus",
    "mode",
    "branchType",
];

const OBJECT_FIELDS: &[&str] = &["configData", "result", "usageData"];

const TIMESTAMP_FIELDS: &[&str] = &["createdTime", "startTime", "endTime", "delayedStartTime"];

/// Validate caller input for a new job
pub fn validate_new_job(value: Value) -> Result<NewJobData> {
    let map = root_object(value)?;
    check_required(&map, NEW_JOB_REQUIRED)?;
    check_enums(&map)?;
    check_objects(&map)?;
    check_runtime(&map)?;
    check_timestamps(&map)?;

    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Validate a complete job record
///
/// `isFinished` is recomputed from `status`; whatever the record carried is
/// ignored.
pub fn validate_job(value: Value) -> Result<JobData> {
    let map = root_object(value)?;
    check_required(&map, JOB_REQUIRED)?;
    check_enums(&map)?;
    check_objects(&map)?;
    check_runtime(&map)?;
    check_timestamps(&map)?;

    let mut job: JobData = serde_json::from_value(Value::Object(map))?;
    job.is_finished = job.status.is_finished();
    Ok(job)
}

/// Validate a list of job records, keeping the error of each bad one
pub fn validate_jobs<I>(values: I) -> Vec<Result<JobData>>
where
    I: IntoIterator<Item = Value>,
{
    values.into_iter().map(validate_job).collect()
}

fn root_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::invalid_type(ROOT, "object", &other)),
    }
}

fn check_required(map: &Map<String, Value>, required: &[&str]) -> Result<()> {
    for field in required {
        if !normalize::is_present(map.get(*field)) {
            return Err(ValidationError::missing_field(ROOT, *field));
        }
    }
    Ok(())
}

fn check_enums(map: &Map<String, Value>) -> Result<()> {
    check_enum::<JobStatus>(map, "status")?;
    check_enum::<DesiredStatus>(map, "desiredStatus")?;
    check_enum::<Mode>(map, "mode")?;
    check_enum::<BranchType>(map, "branchType")?;
    check_enum::<Executor>(map, "executor")?;
    check_enum::<JobType>(map, "type")?;

    if let Some(Value::Object(behavior)) = map.get("behavior") {
        check_enum_at::<OnErrorBehavior>(behavior, "onError", "job.behavior.onError")?;
    }
    Ok(())
}

fn check_enum<T>(map: &Map<String, Value>, key: &str) -> Result<()>
where
    T: FromStr<Err = ValidationError>,
{
    check_enum_at::<T>(map, key, &format!("{ROOT}.{key}"))
}

fn check_enum_at<T>(map: &Map<String, Value>, key: &str, path: &str) -> Result<()>
where
    T: FromStr<Err = ValidationError>,
{
    match map.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(value)) => value.parse::<T>().map(|_| ()),
        Some(other) => Err(ValidationError::invalid_type(path, "string", other)),
    }
}

fn check_objects(map: &Map<String, Value>) -> Result<()> {
    for field in OBJECT_FIELDS {
        if let Some(value) = map.get(*field) {
            normalize::as_object(value.clone()).map_err(|actual| ValidationError::InvalidType {
                path: format!("{ROOT}.{field}"),
                expected: "object".to_string(),
                actual: actual.to_string(),
            })?;
        }
    }
    Ok(())
}

fn check_runtime(map: &Map<String, Value>) -> Result<()> {
    if let Some(value) = map.get("parallelism") {
        Parallelism::from_value(value, "job.parallelism")?;
    }
    VariableValues::from_data(map, ROOT)?;
    Ok(())
}

fn check_timestamps(map: &Map<String, Value>) -> Result<()> {
    for field in TIMESTAMP_FIELDS {
        let path = format!("{ROOT}.{field}");
        match map.get(*field) {
            None | Some(Value::Null) => {}
            Some(Value::String(value)) if value.is_empty() => {}
            Some(Value::String(value)) => {
                timestamp::parse_at(&path, value)?;
            }
            Some(other) => return Err(ValidationError::invalid_type(path, "string", other)),
        }
    }
    Ok(())
}
