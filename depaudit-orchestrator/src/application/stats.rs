//! Aggregate statistics over completed reports

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use utoipa::ToSchema;

use depaudit_core::domain::{AuditReport, JobState, SeverityCounts};

use crate::application::use_cases::UseCaseError;
use crate::infrastructure::job_queue::JobQueue;
use crate::infrastructure::report_store::ReportStore;

/// Concurrent report reads while aggregating
const READ_CONCURRENCY: usize = 16;

/// Classification of every completed job's report.
///
/// `safe + vulnerable == total`; reports that cannot be read are counted in
/// `unreadable` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuditStats {
    pub total: u64,
    pub safe: u64,
    pub vulnerable: u64,
    pub unreadable: u64,
    pub severity: SeverityCounts,
}

impl AuditStats {
    pub fn record(&mut self, report: Option<&AuditReport>) {
        let Some(report) = report else {
            self.unreadable += 1;
            return;
        };

        self.total += 1;
        let counts = report.vulnerability_counts();
        if counts.total() == 0 {
            self.safe += 1;
        } else {
            self.vulnerable += 1;
            self.severity.add(&counts);
        }
    }
}

/// Computes [`AuditStats`] from the queue and report store on demand
pub struct StatsAggregator {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ReportStore>,
}

impl StatsAggregator {
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ReportStore>) -> Self {
        Self { queue, store }
    }

    pub async fn compute(&self) -> Result<AuditStats, UseCaseError> {
        let completed = self.queue.list(&[JobState::Completed]).await?;

        let reports: Vec<Option<AuditReport>> = stream::iter(completed)
            .map(|job| {
                let store = self.store.clone();
                async move { store.get(job.id).await.ok().flatten() }
            })
            .buffer_unordered(READ_CONCURRENCY)
            .collect()
            .await;

        let mut stats = AuditStats::default();
        for report in &reports {
            stats.record(report.as_ref());
        }
        Ok(stats)
    }
}
