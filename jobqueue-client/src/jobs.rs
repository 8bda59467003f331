//! Job endpoints of the Queue API

use async_trait::async_trait;
use jobqueue_core::domain::job::JobStatus;
use jobqueue_core::dto::result::{JobMetrics, JobPatchData, JobResult};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::job::Job;
use crate::orchestration::{JobPage, JobRepository};
use crate::query::ListJobsOptions;
use crate::{QueueClient, TOKEN_HEADER};

impl QueueClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a job built by [`crate::NewJobFactory`]
    ///
    /// # Returns
    /// The job as stored by the API
    pub async fn create_job(&self, job: &Job) -> Result<Job> {
        let url = format!("{}/jobs", self.base_url);
        debug!("Submitting job {}", job.id());
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&job.to_value())
            .send()
            .await?;

        let record: Value = self.handle_response(response).await?;
        self.factory.load_job(record)
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let record: Value = self.handle_response(response).await?;
        self.factory.load_job(record)
    }

    /// List jobs matching `options`
    ///
    /// Malformed records in the response are logged and skipped.
    pub async fn list_jobs(&self, options: &ListJobsOptions) -> Result<Vec<Job>> {
        Ok(self.list_jobs_page(options).await?.jobs)
    }

    /// List one page of jobs, keeping count of every record returned
    pub async fn list_jobs_page(&self, options: &ListJobsOptions) -> Result<JobPage> {
        let url = format!("{}/jobs", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .query(&options.to_query())
            .send()
            .await?;

        let records: Vec<Value> = self.handle_response(response).await?;
        Ok(JobPage {
            fetched: records.len(),
            jobs: self.factory.load_jobs(records),
        })
    }

    // =============================================================================
    // Job Updates
    // =============================================================================

    /// Update selected fields of a job
    ///
    /// # Arguments
    /// * `job_id` - The job to update
    /// * `patch` - Fields to change; unset fields are left alone
    pub async fn patch_job(&self, job_id: &str, patch: &JobPatchData) -> Result<Job> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .patch(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&patch.to_value())
            .send()
            .await?;

        let record: Value = self.handle_response(response).await?;
        self.factory.load_job(record)
    }

    /// Store the final status and result of a job
    pub async fn update_job_result(
        &self,
        job_id: &str,
        status: JobStatus,
        result: JobResult,
        metrics: Option<JobMetrics>,
    ) -> Result<Job> {
        let mut body = JobPatchData::new().with_status(status).with_result(result);
        body.metrics = metrics;

        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .put(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&body.to_value())
            .send()
            .await?;

        let record: Value = self.handle_response(response).await?;
        self.factory.load_job(record)
    }
}

#[async_trait]
impl JobRepository for QueueClient {
    async fn get_job(&self, job_id: &str) -> Result<Job> {
        QueueClient::get_job(self, job_id).await
    }

    async fn list_jobs_page(&self, options: &ListJobsOptions) -> Result<JobPage> {
        QueueClient::list_jobs_page(self, options).await
    }
}
