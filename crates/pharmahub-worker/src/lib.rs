//! # pharmahub-worker
//!
//! Recurring background work: a cron scheduler over a data-driven job
//! table and the built-in notification jobs (scheduled dispatch, retries,
//! digests, expiry, archival, stats and context cache sweeps).

pub mod job;
pub mod jobs;
pub mod scheduler;

pub use job::{JobDefinition, JobHandler, JobInfo, JobOutcome, JobStats};
pub use jobs::{JobServices, builtin_jobs};
pub use scheduler::{Scheduler, SchedulerState};
