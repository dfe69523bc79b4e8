//! Health check handlers.

use axum::Json;
use axum::extract::State;

use pharmahub_core::traits::CacheProvider;

use crate::dto::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let cache_ok = match state.cache.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "Cache health check failed");
            false
        }
    };
    let broadcaster = state.realtime.broadcaster();

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if cache_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cache: if cache_ok { "ok" } else { "unavailable" }.to_string(),
        scheduler: state.scheduler.state().await,
        ws_connections: broadcaster.connection_count(),
        online_users: broadcaster.presence().online_count(),
        realtime: broadcaster.metrics().snapshot(),
        workspace_context: state.resolver.stats(),
    }))
}
