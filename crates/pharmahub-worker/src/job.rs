//! Job table entries and run outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use pharmahub_core::result::AppResult;

/// Work performed on each tick of a job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Run once. The returned value is a summary for logs and admin views.
    async fn run(&self) -> AppResult<Value>;
}

/// One row of the job table.
#[derive(Clone)]
pub struct JobDefinition {
    pub id: String,
    /// Six-field cron expression, seconds first, evaluated in UTC.
    pub schedule: String,
    pub enabled: bool,
    pub handler: Arc<dyn JobHandler>,
}

impl JobDefinition {
    pub fn new(
        id: impl Into<String>,
        schedule: impl Into<String>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            schedule: schedule.into(),
            enabled: true,
            handler,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Result of one job run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { summary: Value, duration_ms: u64 },
    Failed { error: String, duration_ms: u64 },
    /// The previous run was still going, or another node holds the lock.
    Skipped { reason: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Counters kept per job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub runs: u64,
    pub failures: u64,
    pub skipped: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Admin view of a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub schedule: String,
    pub enabled: bool,
    /// Registered with the running cron scheduler.
    pub scheduled: bool,
    pub running: bool,
    #[serde(flatten)]
    pub stats: JobStats,
}
