//! Job execution type and its classification

use serde_json::{Map, Value};

use crate::domain::runtime::Parallelism;
use crate::normalize;

/// Component id of the orchestrator
pub const ORCHESTRATOR_COMPONENT: &str = "keboola.orchestrator";

string_enum! {
    /// How a job is executed
    pub enum JobType at "job.type" {
        Standard => "standard",
        /// Runs configuration rows as child jobs
        RowContainer => "container",
        /// Runs a single orchestration phase
        PhaseContainer => "phaseContainer",
        /// Runs a whole orchestration
        OrchestrationContainer => "orchestrationContainer",
        RetryContainer => "retryContainer",
    }
}

impl Default for JobType {
    fn default() -> Self {
        JobType::Standard
    }
}

impl JobType {
    pub fn is_container(self) -> bool {
        self != JobType::Standard
    }
}

/// Derive the job type from already-resolved job data
///
/// Positive or infinite parallelism makes a row container. Orchestrator jobs
/// are phase containers when `configData.phaseId` is set (a numeric `0`
/// counts as set), orchestration containers otherwise. Everything else is
/// standard.
pub fn classify(
    parallelism: Option<Parallelism>,
    component_id: &str,
    config_data: &Map<String, Value>,
) -> JobType {
    if parallelism.is_some_and(Parallelism::is_parallel) {
        return JobType::RowContainer;
    }

    if component_id == ORCHESTRATOR_COMPONENT {
        return if normalize::is_present(config_data.get("phaseId")) {
            JobType::PhaseContainer
        } else {
            JobType::OrchestrationContainer
        };
    }

    JobType::Standard
}

/// Use `explicit` when given, otherwise [`classify`]
pub fn resolve(
    explicit: Option<JobType>,
    parallelism: Option<Parallelism>,
    component_id: &str,
    config_data: &Map<String, Value>,
) -> JobType {
    explicit.unwrap_or_else(|| classify(parallelism, component_id, config_data))
}
