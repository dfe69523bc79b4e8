//! Workspace context cache administration.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::WithRejection;

use pharmahub_cache::context::ContextCacheStats;

use crate::dto::{ApiResponse, InvalidateContextRequest, InvalidateResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /admin/workspace-context/invalidate
pub async fn invalidate(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<InvalidateContextRequest>, ApiError>,
) -> Result<Json<ApiResponse<InvalidateResponse>>, ApiError> {
    auth.require_admin()?;
    let invalidated = match &req {
        InvalidateContextRequest::Event(event) => state.resolver.apply_event(event),
        InvalidateContextRequest::User { user_id } => {
            usize::from(state.resolver.invalidate_user(*user_id))
        }
    };
    Ok(Json(ApiResponse::ok(InvalidateResponse {
        invalidated,
        cache: state.resolver.stats(),
    })))
}

/// GET /admin/workspace-context/stats
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<ContextCacheStats>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(ApiResponse::ok(state.resolver.stats())))
}
