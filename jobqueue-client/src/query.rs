//! Query parameters of the job listing endpoint

use chrono::{DateTime, Utc};
use jobqueue_core::domain::job::JobStatus;
use jobqueue_core::timestamp;

/// Filters, paging and sorting of a job listing
///
/// List-valued filters are sent as repeated `key[]=value` pairs, scalar ones
/// as `key=value` and dates as RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListJobsOptions {
    pub ids: Vec<String>,
    pub run_ids: Vec<String>,
    pub parent_run_id: Option<String>,
    pub project_id: Option<String>,
    pub branch_id: Option<String>,
    pub component_ids: Vec<String>,
    pub config_ids: Vec<String>,
    pub config_row_ids: Vec<String>,
    pub statuses: Vec<JobStatus>,
    pub token_ids: Vec<String>,
    pub created_time_from: Option<DateTime<Utc>>,
    pub created_time_to: Option<DateTime<Utc>>,
    pub start_time_from: Option<DateTime<Utc>>,
    pub start_time_to: Option<DateTime<Utc>>,
    pub end_time_from: Option<DateTime<Utc>>,
    pub end_time_to: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl ListJobsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct children of a job
    pub fn children_of(job_id: impl Into<String>) -> Self {
        Self {
            parent_run_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_component_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.component_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_created_time_from(mut self, time: DateTime<Utc>) -> Self {
        self.created_time_from = Some(time);
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = Some(order);
        self
    }

    /// Encode as query pairs, in a stable order
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();

        let mut list = |key: &str, values: &mut dyn Iterator<Item = String>| {
            for value in values {
                query.push((format!("{key}[]"), value));
            }
        };
        list("id", &mut self.ids.iter().cloned());
        list("runId", &mut self.run_ids.iter().cloned());
        list("componentId", &mut self.component_ids.iter().cloned());
        list("configId", &mut self.config_ids.iter().cloned());
        list("configRowIds", &mut self.config_row_ids.iter().cloned());
        list("status", &mut self.statuses.iter().map(|s| s.to_string()));
        list("tokenId", &mut self.token_ids.iter().cloned());

        let scalars = [
            ("parentRunId", self.parent_run_id.clone()),
            ("projectId", self.project_id.clone()),
            ("branchId", self.branch_id.clone()),
            ("createdTimeFrom", self.created_time_from.as_ref().map(timestamp::format)),
            ("createdTimeTo", self.created_time_to.as_ref().map(timestamp::format)),
            ("startTimeFrom", self.start_time_from.as_ref().map(timestamp::format)),
            ("startTimeTo", self.start_time_to.as_ref().map(timestamp::format)),
            ("endTimeFrom", self.end_time_from.as_ref().map(timestamp::format)),
            ("endTimeTo", self.end_time_to.as_ref().map(timestamp::format)),
            ("offset", self.offset.map(|v| v.to_string())),
            ("limit", self.limit.map(|v| v.to_string())),
            ("sortBy", self.sort_by.clone()),
            ("sortOrder", self.sort_order.map(|o| o.as_str().to_string())),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                query.push((key.to_string(), value));
            }
        }

        query
    }
}
