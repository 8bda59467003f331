//! Orchestration task matching
//!
//! Pairs the tasks declared by an orchestration with the child jobs that ran
//! them, for rerun and inspection tooling.

use std::sync::Arc;

use async_trait::async_trait;
use jobqueue_core::domain::job_type::ORCHESTRATOR_COMPONENT;
use jobqueue_core::domain::orchestration::{MatchedTask, OrchestrationTaskMatched, TaskMatch};
use jobqueue_core::normalize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::job::Job;
use crate::query::ListJobsOptions;

/// Page size used when listing child jobs
pub const PAGE_SIZE: usize = 100;

/// One page of a job listing
#[derive(Debug)]
pub struct JobPage {
    /// Number of records returned, malformed ones included
    pub fetched: usize,
    /// Records that loaded as jobs
    pub jobs: Vec<Job>,
}

/// Read access to stored jobs
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get_job(&self, job_id: &str) -> Result<Job>;

    /// One page of jobs matching `options`
    async fn list_jobs_page(&self, options: &ListJobsOptions) -> Result<JobPage>;

    async fn list_jobs(&self, options: &ListJobsOptions) -> Result<Vec<Job>> {
        Ok(self.list_jobs_page(options).await?.jobs)
    }

    /// List every job matching `options`, page by page
    ///
    /// Paging follows the number of records returned, so a malformed record
    /// never ends the listing early. A limit of zero pages by [`PAGE_SIZE`].
    async fn list_all_jobs(&self, options: &ListJobsOptions) -> Result<Vec<Job>> {
        let limit = options.limit.filter(|limit| *limit > 0).unwrap_or(PAGE_SIZE);
        let mut offset = options.offset.unwrap_or(0);
        let mut jobs = Vec::new();

        loop {
            let page = self
                .list_jobs_page(&options.clone().with_page(offset, limit))
                .await?;
            jobs.extend(page.jobs);
            if page.fetched < limit {
                return Ok(jobs);
            }
            offset += page.fetched;
        }
    }
}

/// What to report for tasks no child job ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Leave unmatched tasks out
    #[default]
    OmitUnmatched,
    /// Report unmatched tasks with an explicit marker
    ReportUnmatched,
}

/// Matches orchestration tasks with child jobs
pub struct OrchestrationTaskMatcher {
    jobs: Arc<dyn JobRepository>,
}

impl OrchestrationTaskMatcher {
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self { jobs }
    }

    /// Match the tasks of orchestration job `job_id` with its child jobs
    ///
    /// Tasks are walked in declaration order. Each task takes the first
    /// remaining child whose `orchestrationTaskId` equals the task id, so a
    /// child matches at most one task.
    pub async fn match_tasks(&self, job_id: &str, mode: MatchMode) -> Result<OrchestrationTaskMatched> {
        let job = self.jobs.get_job(job_id).await?;
        if job.component_id() != ORCHESTRATOR_COMPONENT {
            return Err(ClientError::orchestration(
                job_id,
                format!("Job is not an orchestration job, component is \"{}\"", job.component_id()),
            ));
        }

        let mut children = self
            .jobs
            .list_all_jobs(&ListJobsOptions::children_of(job.id()))
            .await?;
        let task_ids = task_ids(&job).await?;
        debug!(
            "Matching {} tasks of orchestration {} with {} child jobs",
            task_ids.len(),
            job_id,
            children.len()
        );

        let mut tasks = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            let position = children
                .iter()
                .position(|child| child.orchestration_task_id() == Some(task_id.as_str()));

            match position {
                Some(position) => {
                    let child = children.remove(position);
                    tasks.push(TaskMatch::Matched(MatchedTask {
                        task_id,
                        job_id: child.id().to_string(),
                        component_id: child.component_id().to_string(),
                        config_id: child.config_id().map(str::to_string),
                        status: child.status(),
                    }));
                }
                None if mode == MatchMode::ReportUnmatched => tasks.push(TaskMatch::Unmatched { task_id }),
                None => {}
            }
        }

        Ok(OrchestrationTaskMatched {
            orchestration_job_id: job.id().to_string(),
            configuration_id: job.config_id().map(str::to_string),
            tasks,
        })
    }
}

/// Declared task ids, from the job's configuration data or its persisted
/// configuration
async fn task_ids(job: &Job) -> Result<Vec<String>> {
    let tasks = match job.config_data().get("tasks") {
        Some(tasks) => tasks.clone(),
        None => job
            .component_configuration()
            .await?
            .get("configuration")
            .and_then(|body| body.get("tasks"))
            .cloned()
            .unwrap_or(Value::Null),
    };

    let Value::Array(tasks) = tasks else {
        return Err(ClientError::orchestration(job.id(), "Orchestration tasks must be a list"));
    };

    tasks
        .iter()
        .map(|task| match task.get("id").map(normalize::scalar) {
            Some(Ok(Some(id))) => Ok(id),
            _ => Err(ClientError::orchestration(
                job.id(),
                format!("Task does not have an id. ({task})"),
            )),
        })
        .collect()
}
