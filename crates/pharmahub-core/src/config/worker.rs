//! Scheduler configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Recurring job scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler starts with the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-job overrides keyed by job id (e.g. `"daily-digest"`).
    #[serde(default)]
    pub jobs: HashMap<String, JobOverride>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jobs: HashMap::new(),
        }
    }
}

/// Override for a single registered job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOverride {
    /// Enable or disable the job.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Six-field cron expression (seconds first).
    #[serde(default)]
    pub schedule: Option<String>,
}

fn default_true() -> bool {
    true
}
