//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use pharmahub_auth::IdentityProvider;
use pharmahub_cache::CacheManager;
use pharmahub_core::config::AppConfig;
use pharmahub_realtime::RealtimeEngine;
use pharmahub_service::{
    DeliveryStatsService, NotificationStore, PreferenceService, WorkspaceContextResolver,
};
use pharmahub_worker::Scheduler;

/// Shared dependencies, passed to every handler via `State<AppState>`.
///
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    // Infrastructure
    pub cache: CacheManager,
    /// Verifies bearer tokens for REST and the WebSocket handshake.
    pub identity: Arc<dyn IdentityProvider>,
    pub resolver: Arc<WorkspaceContextResolver>,

    // Notifications
    pub store: Arc<NotificationStore>,
    pub preferences: PreferenceService,
    pub stats: Arc<DeliveryStatsService>,

    // Background and realtime
    pub scheduler: Scheduler,
    pub realtime: RealtimeEngine,

    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("scheduler", &self.scheduler)
            .field("connections", &self.realtime.broadcaster().connection_count())
            .finish_non_exhaustive()
    }
}
