//! Response DTOs.

use serde::{Deserialize, Serialize};

use pharmahub_cache::context::ContextCacheStats;
use pharmahub_core::types::WorkspaceId;
use pharmahub_realtime::MetricsSnapshot;
use pharmahub_worker::{JobInfo, SchedulerState};

/// Standard success wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Unread counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub workspace_id: WorkspaceId,
    pub count: u64,
}

/// Rows changed by a bulk operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: u64,
}

/// Entries dropped from the workspace context cache.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: usize,
    pub cache: ContextCacheStats,
}

/// Scheduler view for operators.
#[derive(Debug, Clone, Serialize)]
pub struct JobsResponse {
    pub state: SchedulerState,
    pub jobs: Vec<JobInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// `GET /health/detailed`.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// "ok" or "unavailable".
    pub cache: String,
    pub scheduler: SchedulerState,
    pub ws_connections: usize,
    pub online_users: usize,
    pub realtime: MetricsSnapshot,
    pub workspace_context: ContextCacheStats,
}
