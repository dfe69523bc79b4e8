//! Built-in recurring jobs.

pub mod context;
pub mod digest;
pub mod notification;

use std::sync::Arc;

use pharmahub_entity::notification::DigestFrequency;
use pharmahub_service::{
    DeliveryStatsService, DigestService, NotificationStore, WorkspaceContextResolver,
};

use crate::job::JobDefinition;

pub use context::ContextSweepJob;
pub use digest::DigestJob;
pub use notification::{
    ArchiveOldJob, CleanupExpiredJob, ProcessScheduledJob, RetryFailedJob, UpdateStatsJob,
};

/// Services the built-in jobs operate on.
#[derive(Clone)]
pub struct JobServices {
    pub store: Arc<NotificationStore>,
    pub digests: Arc<DigestService>,
    pub stats: Arc<DeliveryStatsService>,
    pub resolver: Arc<WorkspaceContextResolver>,
    /// Seconds between workspace context sweeps.
    pub context_sweep_seconds: u64,
}

/// The default job table. Schedules use six-field cron (seconds first).
pub fn builtin_jobs(services: &JobServices) -> Vec<JobDefinition> {
    vec![
        JobDefinition::new(
            "process-scheduled",
            "0 * * * * *",
            Arc::new(ProcessScheduledJob::new(services.store.clone())),
        ),
        JobDefinition::new(
            "retry-failed",
            "0 */5 * * * *",
            Arc::new(RetryFailedJob::new(services.store.clone())),
        ),
        JobDefinition::new(
            "hourly-digest",
            "0 0 * * * *",
            Arc::new(DigestJob::new(services.digests.clone(), DigestFrequency::Hourly)),
        ),
        JobDefinition::new(
            "daily-digest",
            "0 0 8 * * *",
            Arc::new(DigestJob::new(services.digests.clone(), DigestFrequency::Daily)),
        ),
        JobDefinition::new(
            "weekly-digest",
            "0 0 8 * * Mon",
            Arc::new(DigestJob::new(services.digests.clone(), DigestFrequency::Weekly)),
        ),
        JobDefinition::new(
            "cleanup-expired",
            "0 0 2 * * *",
            Arc::new(CleanupExpiredJob::new(services.store.clone())),
        ),
        JobDefinition::new(
            "archive-old",
            "0 0 3 * * Sun",
            Arc::new(ArchiveOldJob::new(services.store.clone())),
        ),
        JobDefinition::new(
            "update-stats",
            "0 30 * * * *",
            Arc::new(UpdateStatsJob::new(services.stats.clone())),
        ),
        JobDefinition::new(
            "context-cache-sweep",
            context::sweep_schedule(services.context_sweep_seconds),
            Arc::new(ContextSweepJob::new(services.resolver.clone())),
        ),
    ]
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_builtin_table_ids_are_unique() {
        let (services, _) = testing::services();
        let jobs = builtin_jobs(&services);
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids.len(), jobs.len());
        assert!(ids.contains("process-scheduled"));
        assert!(ids.contains("weekly-digest"));
        assert!(jobs.iter().all(|j| j.enabled));
        let sweep = jobs.iter().find(|j| j.id == "context-cache-sweep").unwrap();
        assert_eq!(sweep.schedule, "0 */10 * * * *");
    }
}
