//! Forced notification sweeps and delivery statistics.

use axum::Json;
use axum::extract::State;

use pharmahub_entity::notification::NotificationStats;
use pharmahub_worker::JobOutcome;

use crate::dto::{ApiResponse, ChangedResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

type OutcomeResult = Result<Json<ApiResponse<JobOutcome>>, ApiError>;

/// Run a job through the scheduler so forced and timed runs never overlap.
async fn force(state: &AppState, auth: &AuthUser, job_id: &str) -> OutcomeResult {
    auth.require_admin()?;
    tracing::info!(job = job_id, admin = %auth.user_id(), "Forced job run");
    let outcome = state.scheduler.run_job(job_id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /admin/notifications/process-scheduled
pub async fn process_scheduled(State(state): State<AppState>, auth: AuthUser) -> OutcomeResult {
    force(&state, &auth, "process-scheduled").await
}

/// POST /admin/notifications/retry-failed
pub async fn retry_failed(State(state): State<AppState>, auth: AuthUser) -> OutcomeResult {
    force(&state, &auth, "retry-failed").await
}

/// POST /admin/notifications/archive-old
pub async fn archive_old(State(state): State<AppState>, auth: AuthUser) -> OutcomeResult {
    force(&state, &auth, "archive-old").await
}

/// DELETE /admin/notifications/expired
pub async fn delete_expired(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<ChangedResponse>>, ApiError> {
    auth.require_admin()?;
    let changed = state.store.delete_expired().await?;
    tracing::info!(deleted = changed, admin = %auth.user_id(), "Expired notifications deleted");
    Ok(Json(ApiResponse::ok(ChangedResponse { changed })))
}

/// GET /admin/notifications/stats
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<NotificationStats>>, ApiError> {
    auth.require_admin()?;
    let stats = state.stats.latest().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
