//! Cron scheduler over a data-driven job table.
//!
//! The table is independent of the cron engine: jobs can be added,
//! removed or run by hand whether or not the scheduler is running. Each
//! run passes through [`Scheduler::run_job`], which holds a per-job
//! in-flight guard plus a cross-node cache lock, isolates panics and
//! never lets a failure escape. Both are released even if the caller
//! stops waiting for the run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pharmahub_cache::{CacheManager, keys};
use pharmahub_core::config::WorkerConfig;
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_core::traits::CacheProvider;

use crate::job::{JobDefinition, JobInfo, JobOutcome, JobStats};

/// Upper bound on a cross-node job lock; a crashed node frees it after this.
const JOB_LOCK_TTL: Duration = Duration::from_secs(30 * 60);

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct JobEntry {
    definition: JobDefinition,
    in_flight: AtomicBool,
    cron_id: Mutex<Option<Uuid>>,
    stats: Mutex<JobStats>,
}

impl JobEntry {
    fn new(definition: JobDefinition) -> Self {
        Self {
            definition,
            in_flight: AtomicBool::new(false),
            cron_id: Mutex::new(None),
            stats: Mutex::new(JobStats::default()),
        }
    }

    fn stats(&self) -> MutexGuard<'_, JobStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cron_id(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.cron_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn info(&self) -> JobInfo {
        JobInfo {
            id: self.definition.id.clone(),
            schedule: self.definition.schedule.clone(),
            enabled: self.definition.enabled,
            scheduled: self.cron_id().is_some(),
            running: self.in_flight.load(Ordering::SeqCst),
            stats: self.stats().clone(),
        }
    }
}

/// Clears a job's in-flight flag when dropped.
struct InFlight<'a>(&'a JobEntry);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    jobs: Mutex<HashMap<String, Arc<JobEntry>>>,
    engine: tokio::sync::Mutex<Option<JobScheduler>>,
    cache: CacheManager,
}

/// Recurring job scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.job_ids())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Empty, stopped scheduler.
    pub fn new(cache: CacheManager) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                engine: tokio::sync::Mutex::new(None),
                cache,
            }),
        }
    }

    /// Scheduler pre-loaded with `jobs` after applying config overrides.
    pub fn with_jobs(
        cache: CacheManager,
        jobs: Vec<JobDefinition>,
        config: &WorkerConfig,
    ) -> AppResult<Self> {
        let scheduler = Self::new(cache);
        for job in apply_overrides(jobs, config) {
            validate_schedule(&job)?;
            scheduler.jobs().insert(job.id.clone(), Arc::new(JobEntry::new(job)));
        }
        Ok(scheduler)
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Arc<JobEntry>>> {
        self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, id: &str) -> Option<Arc<JobEntry>> {
        self.jobs().get(id).cloned()
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Admin view of every job, sorted by id.
    pub fn jobs_info(&self) -> Vec<JobInfo> {
        let mut infos: Vec<JobInfo> = self.jobs().values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn job_info(&self, id: &str) -> Option<JobInfo> {
        self.entry(id).map(|e| e.info())
    }

    pub async fn state(&self) -> SchedulerState {
        if self.inner.engine.lock().await.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Add or replace a job. While running, an enabled job is scheduled at once.
    pub async fn add_job(&self, definition: JobDefinition) -> AppResult<()> {
        validate_schedule(&definition)?;
        let id = definition.id.clone();
        let entry = Arc::new(JobEntry::new(definition));

        let engine = self.inner.engine.lock().await;
        let previous = self.jobs().insert(id.clone(), entry.clone());
        if let (Some(engine), Some(previous)) = (engine.as_ref(), previous) {
            unschedule(engine, &previous).await;
        }
        if let Some(engine) = engine.as_ref()
            && entry.definition.enabled
        {
            self.schedule(engine, entry).await?;
        }
        info!(job = %id, "Job added");
        Ok(())
    }

    /// Remove a job. Returns false if it did not exist.
    pub async fn remove_job(&self, id: &str) -> AppResult<bool> {
        let engine = self.inner.engine.lock().await;
        let Some(entry) = self.jobs().remove(id) else {
            return Ok(false);
        };
        if let Some(engine) = engine.as_ref() {
            unschedule(engine, &entry).await;
        }
        info!(job = %id, "Job removed");
        Ok(true)
    }

    /// Start the cron engine and schedule every enabled job.
    pub async fn start(&self) -> AppResult<()> {
        let mut engine = self.inner.engine.lock().await;
        if engine.is_some() {
            return Ok(());
        }
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let entries: Vec<Arc<JobEntry>> = self.jobs().values().cloned().collect();
        for entry in entries {
            if entry.definition.enabled {
                self.schedule(&scheduler, entry).await?;
            } else {
                debug!(job = %entry.definition.id, "Job disabled, not scheduled");
            }
        }

        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        *engine = Some(scheduler);
        info!(jobs = self.jobs().len(), "Scheduler started");
        Ok(())
    }

    /// Stop the cron engine. Runs already in progress finish on their own.
    pub async fn stop(&self) -> AppResult<()> {
        let Some(mut scheduler) = self.inner.engine.lock().await.take() else {
            return Ok(());
        };
        for entry in self.jobs().values() {
            entry.cron_id().take();
        }
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to stop scheduler: {e}")))?;
        info!("Scheduler stopped");
        Ok(())
    }

    async fn schedule(&self, engine: &JobScheduler, entry: Arc<JobEntry>) -> AppResult<()> {
        let id = entry.definition.id.clone();
        let scheduler = self.clone();
        let job_id = id.clone();
        let cron = CronJob::new_async(entry.definition.schedule.as_str(), move |_uuid, _lock| {
            let scheduler = scheduler.clone();
            let job_id = job_id.clone();
            Box::pin(async move {
                if let Err(e) = scheduler.run_job(&job_id).await {
                    warn!(job = %job_id, error = %e, "Scheduled tick for a removed job");
                }
            })
        })
        .map_err(|e| AppError::validation(format!("Invalid schedule for job '{id}': {e}")))?;

        let cron_id = engine
            .add(cron)
            .await
            .map_err(|e| AppError::internal(format!("Failed to schedule job '{id}': {e}")))?;
        *entry.cron_id() = Some(cron_id);
        info!(job = %id, schedule = %entry.definition.schedule, "Job scheduled");
        Ok(())
    }

    /// Run a job now.
    ///
    /// Fails only for an unknown id; handler errors and panics come back as
    /// [`JobOutcome::Failed`].
    pub async fn run_job(&self, id: &str) -> AppResult<JobOutcome> {
        let entry = self
            .entry(id)
            .ok_or_else(|| AppError::not_found(format!("Job '{id}' is not registered")))?;

        if entry
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(job = %id, "Previous run still in flight, skipping");
            entry.stats().skipped += 1;
            return Ok(JobOutcome::Skipped {
                reason: "previous run still in progress".into(),
            });
        }

        // The guarded section runs on its own task so a caller that stops
        // waiting (client gone, timeout) cannot skip the cleanup.
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            let _in_flight = InFlight(&entry);
            scheduler.run_locked(&entry).await
        });
        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(join) => {
                error!(job = %id, error = %join, "Job runner aborted");
                Ok(JobOutcome::Failed {
                    error: format!("job runner aborted: {join}"),
                    duration_ms: 0,
                })
            }
        }
    }

    async fn run_locked(&self, entry: &JobEntry) -> JobOutcome {
        let id = entry.definition.id.as_str();
        let lock_key = keys::job_lock(id);
        match self.inner.cache.set_nx(&lock_key, "1", JOB_LOCK_TTL).await {
            Ok(true) => {}
            Ok(false) => {
                entry.stats().skipped += 1;
                return JobOutcome::Skipped {
                    reason: "locked by another node".into(),
                };
            }
            Err(e) => warn!(job = %id, error = %e, "Job lock unavailable, running unlocked"),
        }

        let outcome = self.execute(entry).await;

        if let Err(e) = self.inner.cache.delete(&lock_key).await {
            warn!(job = %id, error = %e, "Failed to release job lock");
        }
        outcome
    }

    async fn execute(&self, entry: &JobEntry) -> JobOutcome {
        let id = entry.definition.id.as_str();
        entry.stats().last_started_at = Some(Utc::now());
        let started = Instant::now();

        let handler = entry.definition.handler.clone();
        let result = tokio::spawn(async move { handler.run().await }).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(Ok(summary)) => {
                info!(job = %id, duration_ms, summary = %summary, "Job completed");
                JobOutcome::Completed {
                    summary,
                    duration_ms,
                }
            }
            Ok(Err(e)) => {
                error!(job = %id, duration_ms, error = %e, "Job failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                    duration_ms,
                }
            }
            Err(join) => {
                error!(job = %id, duration_ms, error = %join, "Job panicked");
                JobOutcome::Failed {
                    error: format!("job panicked: {join}"),
                    duration_ms,
                }
            }
        };

        let mut stats = entry.stats();
        stats.runs += 1;
        stats.last_finished_at = Some(Utc::now());
        match &outcome {
            JobOutcome::Failed { error, .. } => {
                stats.failures += 1;
                stats.last_error = Some(error.clone());
            }
            _ => stats.last_error = None,
        }
        outcome
    }
}

async fn unschedule(engine: &JobScheduler, entry: &JobEntry) {
    let cron_id = entry.cron_id().take();
    if let Some(cron_id) = cron_id
        && let Err(e) = engine.remove(&cron_id).await
    {
        warn!(job = %entry.definition.id, error = %e, "Failed to unschedule job");
    }
}

fn validate_schedule(definition: &JobDefinition) -> AppResult<()> {
    CronJob::new_async(definition.schedule.as_str(), |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| {
            AppError::validation(format!(
                "Invalid schedule '{}' for job '{}': {e}",
                definition.schedule, definition.id
            ))
        })
}

/// Apply `worker.jobs` overrides to the built-in table.
pub fn apply_overrides(jobs: Vec<JobDefinition>, config: &WorkerConfig) -> Vec<JobDefinition> {
    for id in config.jobs.keys() {
        if !jobs.iter().any(|job| &job.id == id) {
            warn!(job = %id, "Override for unknown job ignored");
        }
    }
    jobs.into_iter()
        .map(|mut job| {
            if let Some(over) = config.jobs.get(&job.id) {
                if let Some(enabled) = over.enabled {
                    job.enabled = enabled;
                }
                if let Some(schedule) = &over.schedule {
                    job.schedule = schedule.clone();
                }
            }
            job
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use pharmahub_core::config::JobOverride;
    use serde_json::{Value, json};
    use tokio::sync::Notify;

    use super::*;
    use crate::job::JobHandler;

    #[derive(Default)]
    struct Counting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for Counting {
        async fn run(&self) -> AppResult<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({ "calls": n }))
        }
    }

    struct FailsFirst {
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for FailsFirst {
        async fn run(&self) -> AppResult<Value> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AppError::database("connection reset"));
            }
            Ok(Value::Null)
        }
    }

    struct Panics;

    #[async_trait]
    impl JobHandler for Panics {
        async fn run(&self) -> AppResult<Value> {
            panic!("handler blew up");
        }
    }

    struct Blocks {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl JobHandler for Blocks {
        async fn run(&self) -> AppResult<Value> {
            self.release.notified().await;
            Ok(Value::Null)
        }
    }

    struct Sleeps(Duration);

    #[async_trait]
    impl JobHandler for Sleeps {
        async fn run(&self) -> AppResult<Value> {
            tokio::time::sleep(self.0).await;
            Ok(Value::Null)
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(CacheManager::in_memory())
    }

    #[tokio::test]
    async fn test_run_job_records_stats() {
        let s = scheduler();
        s.add_job(JobDefinition::new("count", "0 * * * * *", Arc::new(Counting::default())))
            .await
            .unwrap();

        let outcome = s.run_job("count").await.unwrap();
        assert!(outcome.is_completed());
        s.run_job("count").await.unwrap();

        let info = s.job_info("count").unwrap();
        assert_eq!(info.stats.runs, 2);
        assert_eq!(info.stats.failures, 0);
        assert!(info.stats.last_finished_at.is_some());
        assert!(!info.running);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_runs() {
        let s = scheduler();
        let handler = Arc::new(FailsFirst {
            calls: AtomicU32::new(0),
        });
        s.add_job(JobDefinition::new("flaky", "0 * * * * *", handler))
            .await
            .unwrap();

        match s.run_job("flaky").await.unwrap() {
            JobOutcome::Failed { error, .. } => assert!(error.contains("connection reset")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(s.run_job("flaky").await.unwrap().is_completed());

        let info = s.job_info("flaky").unwrap();
        assert_eq!(info.stats.runs, 2);
        assert_eq!(info.stats.failures, 1);
        assert!(info.stats.last_error.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let s = scheduler();
        s.add_job(JobDefinition::new("boom", "0 * * * * *", Arc::new(Panics)))
            .await
            .unwrap();

        let outcome = s.run_job("boom").await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        // in-flight guard and lock are released
        assert!(matches!(
            s.run_job("boom").await.unwrap(),
            JobOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let s = scheduler();
        let release = Arc::new(Notify::new());
        s.add_job(JobDefinition::new(
            "slow",
            "0 * * * * *",
            Arc::new(Blocks {
                release: release.clone(),
            }),
        ))
        .await
        .unwrap();

        let first = tokio::spawn({
            let s = s.clone();
            async move { s.run_job("slow").await }
        });
        while !s.job_info("slow").unwrap().running {
            tokio::task::yield_now().await;
        }

        let second = s.run_job("slow").await.unwrap();
        assert!(matches!(second, JobOutcome::Skipped { .. }));

        release.notify_one();
        assert!(first.await.unwrap().unwrap().is_completed());
        assert_eq!(s.job_info("slow").unwrap().stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_abandoned_run_does_not_block_next_tick() {
        let cache = CacheManager::in_memory();
        let s = Scheduler::new(cache.clone());
        s.add_job(JobDefinition::new(
            "slow",
            "0 * * * * *",
            Arc::new(Sleeps(Duration::from_millis(200))),
        ))
        .await
        .unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), s.run_job("slow")).await;
        assert!(abandoned.is_err());
        assert!(s.job_info("slow").unwrap().running);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let info = s.job_info("slow").unwrap();
        assert!(!info.running);
        assert_eq!(info.stats.runs, 1);
        assert!(cache.get(&keys::job_lock("slow")).await.unwrap().is_none());

        assert!(s.run_job("slow").await.unwrap().is_completed());
        assert!(s.run_job("slow").await.unwrap().is_completed());
        assert_eq!(s.job_info("slow").unwrap().stats.skipped, 0);
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere_skips() {
        let cache = CacheManager::in_memory();
        let s = Scheduler::new(cache.clone());
        s.add_job(JobDefinition::new("count", "0 * * * * *", Arc::new(Counting::default())))
            .await
            .unwrap();

        cache
            .set_nx(&keys::job_lock("count"), "other-node", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            s.run_job("count").await.unwrap(),
            JobOutcome::Skipped { .. }
        ));

        cache.delete(&keys::job_lock("count")).await.unwrap();
        assert!(s.run_job("count").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_unknown_job_and_bad_schedule() {
        let s = scheduler();
        let err = s.run_job("missing").await.unwrap_err();
        assert_eq!(err.kind.to_string(), "NOT_FOUND");

        let err = s
            .add_job(JobDefinition::new("bad", "every tuesday", Arc::new(Counting::default())))
            .await
            .unwrap_err();
        assert_eq!(err.kind.to_string(), "VALIDATION");
        assert!(s.job_info("bad").is_none());
    }

    #[tokio::test]
    async fn test_disabled_job_still_runs_on_demand() {
        let s = scheduler();
        s.add_job(
            JobDefinition::new("off", "0 * * * * *", Arc::new(Counting::default())).disabled(),
        )
        .await
        .unwrap();
        assert!(s.run_job("off").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_overrides_applied() {
        let jobs = vec![
            JobDefinition::new("a", "0 * * * * *", Arc::new(Counting::default())),
            JobDefinition::new("b", "0 * * * * *", Arc::new(Counting::default())),
        ];
        let config = WorkerConfig {
            enabled: true,
            jobs: HashMap::from([
                (
                    "a".to_string(),
                    JobOverride {
                        enabled: Some(false),
                        schedule: None,
                    },
                ),
                (
                    "b".to_string(),
                    JobOverride {
                        enabled: None,
                        schedule: Some("0 0 * * * *".into()),
                    },
                ),
                (
                    "ghost".to_string(),
                    JobOverride {
                        enabled: Some(false),
                        schedule: None,
                    },
                ),
            ]),
        };

        let s = Scheduler::with_jobs(CacheManager::in_memory(), jobs, &config).unwrap();
        assert_eq!(s.job_ids(), vec!["a", "b"]);
        assert!(!s.job_info("a").unwrap().enabled);
        assert_eq!(s.job_info("b").unwrap().schedule, "0 0 * * * *");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_stop_and_live_changes() {
        let s = scheduler();
        let ticker = Arc::new(Counting::default());
        s.add_job(JobDefinition::new("idle", "0 0 0 1 1 *", Arc::new(Counting::default())))
            .await
            .unwrap();
        assert_eq!(s.state().await, SchedulerState::Stopped);

        s.start().await.unwrap();
        assert_eq!(s.state().await, SchedulerState::Running);
        assert!(s.job_info("idle").unwrap().scheduled);

        s.add_job(JobDefinition::new("tick", "* * * * * *", ticker.clone()))
            .await
            .unwrap();
        assert!(s.job_info("tick").unwrap().scheduled);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(ticker.calls.load(Ordering::SeqCst) >= 1);

        assert!(s.remove_job("tick").await.unwrap());
        assert!(!s.remove_job("tick").await.unwrap());

        s.stop().await.unwrap();
        assert_eq!(s.state().await, SchedulerState::Stopped);
        assert!(!s.job_info("idle").unwrap().scheduled);
    }
}
