//! Loading and modifying existing jobs

use std::sync::Arc;

use jobqueue_core::definition;
use serde_json::{Map, Value};
use tracing::warn;

use super::JobDependencies;
use crate::error::Result;
use crate::job::Job;

/// Wraps persisted job records
///
/// Records are validated against the full job schema; nothing is resolved,
/// verified or re-encrypted.
#[derive(Clone)]
pub struct ExistingJobFactory {
    deps: Arc<JobDependencies>,
}

impl ExistingJobFactory {
    pub fn new(deps: Arc<JobDependencies>) -> Self {
        Self { deps }
    }

    /// Validate a stored record and wrap it
    pub fn load_job(&self, record: Value) -> Result<Job> {
        let data = definition::validate_job(record)?;
        Ok(Job::new(data, self.deps.clone()))
    }

    /// Wrap a batch of stored records
    ///
    /// A malformed record is logged and skipped instead of failing the batch.
    pub fn load_jobs(&self, records: Vec<Value>) -> Vec<Job> {
        let ids: Vec<Value> = records
            .iter()
            .map(|record| record.get("id").cloned().unwrap_or(Value::Null))
            .collect();

        definition::validate_jobs(records)
            .into_iter()
            .zip(ids)
            .filter_map(|(validated, id)| match validated {
                Ok(data) => Some(Job::new(data, self.deps.clone())),
                Err(e) => {
                    warn!("Skipping malformed job record {}: {}", id, e);
                    None
                }
            })
            .collect()
    }

    /// New job from `job` with `patch` merged over its record
    ///
    /// The merge is shallow: each key of `patch` replaces the whole field.
    /// The result is validated against the full schema again.
    pub fn modify_job(&self, job: &Job, patch: Map<String, Value>) -> Result<Job> {
        let mut record = match job.to_value() {
            Value::Object(record) => record,
            _ => Map::new(),
        };
        record.extend(patch);
        self.load_job(Value::Object(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fakes, job_record};
    use jobqueue_core::domain::job::JobStatus;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let fakes = Fakes::new();
        let factory = fakes.existing_factory();

        let mut record = job_record("keboola.ex-db", Some("456"));
        record["runId"] = json!("12.34.56");
        record["createdTime"] = json!("2024-03-01 10:00:00");
        record["isFinished"] = json!(true);

        let job = factory.load_job(record).unwrap();
        let reloaded = factory.load_job(job.to_value()).unwrap();

        assert_eq!(reloaded.data(), job.data());
        assert_eq!(reloaded.parent_run_id(), "12.34");
        assert!(!reloaded.is_finished());
        assert_eq!(reloaded.to_value()["createdTime"], "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_load_jobs_skips_malformed() {
        let fakes = Fakes::new();

        let mut broken = job_record("keboola.ex-db", None);
        broken["id"] = json!("2");
        broken.as_object_mut().unwrap().remove("branchType");

        let jobs = fakes
            .existing_factory()
            .load_jobs(vec![job_record("keboola.ex-db", None), broken]);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id(), "1001");
    }

    #[test]
    fn test_modify_job_returns_new_job() {
        let fakes = Fakes::new();
        let factory = fakes.existing_factory();
        let job = factory.load_job(job_record("keboola.ex-db", None)).unwrap();

        let mut patch = Map::new();
        patch.insert("status".into(), json!("error"));
        let modified = factory.modify_job(&job, patch).unwrap();

        assert_eq!(modified.status(), JobStatus::Error);
        assert!(modified.is_finished());
        assert_eq!(job.status(), JobStatus::Created);

        let mut patch = Map::new();
        patch.insert("status".into(), json!("unknown"));
        assert!(factory.modify_job(&job, patch).is_err());
    }
}
