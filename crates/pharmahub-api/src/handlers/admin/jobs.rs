//! Job management handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum_extra::extract::WithRejection;

use pharmahub_core::error::AppError;
use pharmahub_worker::{JobInfo, JobOutcome};

use crate::dto::{ApiResponse, JobsResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<JobsResponse>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(ApiResponse::ok(JobsResponse {
        state: state.scheduler.state().await,
        jobs: state.scheduler.jobs_info(),
    })))
}

/// GET /admin/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<ApiResponse<JobInfo>>, ApiError> {
    auth.require_admin()?;
    let info = state
        .scheduler
        .job_info(&id)
        .ok_or_else(|| AppError::not_found(format!("Job '{id}' is not registered")))?;
    Ok(Json(ApiResponse::ok(info)))
}

/// POST /admin/jobs/{id}/run
pub async fn run_job(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<ApiResponse<JobOutcome>>, ApiError> {
    auth.require_admin()?;
    let outcome = state.scheduler.run_job(&id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
