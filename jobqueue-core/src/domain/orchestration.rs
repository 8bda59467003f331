//! Orchestration task matching results

use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;

/// A declared orchestration task paired with the child job that ran it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTask {
    pub task_id: String,
    pub job_id: String,
    pub component_id: String,
    pub config_id: Option<String>,
    pub status: JobStatus,
}

/// Outcome of matching a single task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TaskMatch {
    Matched(MatchedTask),
    #[serde(rename_all = "camelCase")]
    Unmatched { task_id: String },
}

impl TaskMatch {
    pub fn task_id(&self) -> &str {
        match self {
            TaskMatch::Matched(task) => &task.task_id,
            TaskMatch::Unmatched { task_id } => task_id,
        }
    }

    pub fn matched(&self) -> Option<&MatchedTask> {
        match self {
            TaskMatch::Matched(task) => Some(task),
            TaskMatch::Unmatched { .. } => None,
        }
    }
}

/// Tasks of one orchestration job, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationTaskMatched {
    pub orchestration_job_id: String,
    pub configuration_id: Option<String>,
    pub tasks: Vec<TaskMatch>,
}

impl OrchestrationTaskMatched {
    pub fn matched_tasks(&self) -> impl Iterator<Item = &MatchedTask> {
        self.tasks.iter().filter_map(TaskMatch::matched)
    }

    pub fn unmatched_task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .filter(|task| task.matched().is_none())
            .map(TaskMatch::task_id)
    }

    /// Whether every declared task has a child job
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|task| task.matched().is_some())
    }
}
