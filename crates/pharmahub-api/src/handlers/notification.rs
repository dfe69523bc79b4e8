//! Notification handlers for the signed-in user.
//!
//! Read-state changes are echoed to the user's live connections so other
//! devices stay in sync.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;
use tracing::info;

use pharmahub_core::error::AppError;
use pharmahub_core::types::{NotificationId, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    DeliveryChannels, NewNotification, Notification, NotificationPreferences, NotificationType,
    PreferencesUpdate,
};
use pharmahub_realtime::ServerEvent;
use pharmahub_service::{NotificationPage, ReadReceipt};

use crate::dto::{
    ApiResponse, BulkReadRequest, ChangedResponse, CountResponse, CreateNotificationRequest,
};
use crate::error::ApiError;
use crate::extractors::{AuthUser, ListNotificationsQuery, ValidatedJson};
use crate::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// POST /notifications
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    if req.notification_type == NotificationType::Digest {
        return Err(AppError::validation("Digest notifications are generated by the system").into());
    }
    let workspace_id = match req.workspace_id {
        Some(ws) if auth.is_platform_admin() => ws,
        Some(ws) => {
            if auth.require_workspace()? != ws {
                return Err(AppError::authorization(
                    "Cannot create notifications in another workspace",
                )
                .into());
            }
            ws
        }
        None => auth.require_workspace()?,
    };

    let notification = state
        .store
        .create(req.into_new(workspace_id, auth.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(notification))))
}

/// GET /notifications
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListNotificationsQuery>, ApiError>,
) -> ApiResult<NotificationPage> {
    let workspace_id = auth.require_workspace()?;
    let page = state.store.page_request(query.limit, query.offset);
    let result = state
        .store
        .list_for_user(auth.user_id(), workspace_id, &query.filter(), &page)
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// GET /notifications/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<NotificationId>, ApiError>,
) -> ApiResult<Notification> {
    let notification = state.store.get(id, auth.user_id()).await?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// POST /notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<NotificationId>, ApiError>,
) -> ApiResult<ReadReceipt> {
    let receipt = state.store.mark_as_read(id, auth.user_id()).await?;
    if receipt.changed {
        state.realtime.broadcaster().send_to_user(
            auth.user_id(),
            &ServerEvent::MarkedRead {
                notification_id: receipt.notification_id,
                unread_count: receipt.unread_count,
            },
        );
    }
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /notifications/read-bulk
pub async fn mark_bulk_read(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<BulkReadRequest>,
) -> ApiResult<ChangedResponse> {
    let changed = state
        .store
        .mark_many_as_read(auth.user_id(), &req.notification_ids)
        .await?;
    if changed > 0
        && let Some(workspace_id) = auth.workspace_id()
    {
        push_unread_count(&state, auth.user_id(), workspace_id).await?;
    }
    Ok(Json(ApiResponse::ok(ChangedResponse { changed })))
}

/// POST /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ChangedResponse> {
    let workspace_id = auth.require_workspace()?;
    let changed = state
        .store
        .mark_all_as_read(auth.user_id(), workspace_id)
        .await?;
    if changed > 0 {
        push_unread_count(&state, auth.user_id(), workspace_id).await?;
    }
    Ok(Json(ApiResponse::ok(ChangedResponse { changed })))
}

/// POST /notifications/{id}/dismiss
pub async fn dismiss(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<NotificationId>, ApiError>,
) -> ApiResult<Notification> {
    let notification = state.store.mark_as_dismissed(id, auth.user_id()).await?;
    push_unread_count(&state, auth.user_id(), notification.workspace_id).await?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<CountResponse> {
    let workspace_id = auth.require_workspace()?;
    let count = state.store.unread_count(auth.user_id(), workspace_id).await?;
    Ok(Json(ApiResponse::ok(CountResponse {
        workspace_id,
        count,
    })))
}

/// GET /notifications/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<NotificationPreferences> {
    let prefs = state.preferences.get(auth.user_id()).await?;
    Ok(Json(ApiResponse::ok(prefs)))
}

/// PUT /notifications/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(update), _): WithRejection<Json<PreferencesUpdate>, ApiError>,
) -> ApiResult<NotificationPreferences> {
    let prefs = state.preferences.update(auth.user_id(), update).await?;
    state.realtime.broadcaster().send_to_user(
        auth.user_id(),
        &ServerEvent::PreferencesUpdated(Box::new(prefs.clone())),
    );
    Ok(Json(ApiResponse::ok(prefs)))
}

/// POST /notifications/test
///
/// Sends a synthetic announcement to the caller on every channel, filtered
/// by their preferences like any other notification.
pub async fn send_test(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    let workspace_id = auth.require_workspace()?;
    let input = NewNotification::new(
        auth.user_id(),
        workspace_id,
        NotificationType::SystemAnnouncement,
        "Test notification",
        "This is a test notification. If you can see it, delivery is working.",
        auth.user_id(),
    )
    .with_channels(DeliveryChannels {
        in_app: true,
        email: true,
        sms: true,
        push: true,
    })
    .with_data(serde_json::json!({ "test": true }));

    let notification = state.store.create(input).await?;
    info!(user_id = %auth.user_id(), notification_id = %notification.id, "Test notification sent");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(notification))))
}

async fn push_unread_count(
    state: &AppState,
    user_id: UserId,
    workspace_id: WorkspaceId,
) -> Result<(), ApiError> {
    let count = state.store.unread_count(user_id, workspace_id).await?;
    state.realtime.broadcaster().send_to_user(
        user_id,
        &ServerEvent::UnreadCount {
            workspace_id,
            count,
        },
    );
    Ok(())
}
