//! Orchestrator API controllers

pub mod health;
pub mod jobs;
pub mod stats;

use std::sync::Arc;

use crate::application::stats::StatsAggregator;
use crate::application::use_cases::{
    GetJobReportUseCase, ListJobsUseCase, QueueCountsUseCase, SubmitAuditUseCase,
};
use crate::infrastructure::job_queue::JobQueue;
use crate::infrastructure::report_store::ReportStore;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub submit_use_case: Arc<SubmitAuditUseCase>,
    pub get_job_use_case: Arc<GetJobReportUseCase>,
    pub list_jobs_use_case: Arc<ListJobsUseCase>,
    pub queue_counts_use_case: Arc<QueueCountsUseCase>,
    pub stats_aggregator: Arc<StatsAggregator>,
}

impl AppState {
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            submit_use_case: Arc::new(SubmitAuditUseCase::new(queue.clone())),
            get_job_use_case: Arc::new(GetJobReportUseCase::new(queue.clone(), store.clone())),
            list_jobs_use_case: Arc::new(ListJobsUseCase::new(queue.clone())),
            queue_counts_use_case: Arc::new(QueueCountsUseCase::new(queue.clone())),
            stats_aggregator: Arc::new(StatsAggregator::new(queue, store)),
        }
    }
}
