//! Workspace context cache configuration.

use serde::{Deserialize, Serialize};

/// TTL and sweep interval for the per-user workspace context cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceContextConfig {
    /// Maximum age of a cache hit, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Interval between proactive sweeps of stale entries, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for WorkspaceContextConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}
