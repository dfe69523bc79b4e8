//! Request DTOs with validation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use pharmahub_core::events::WorkspaceEvent;
use pharmahub_core::types::{BatchId, NotificationId, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    DeliveryChannels, NewNotification, NotificationPriority, NotificationType,
};

/// `POST /notifications` body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateNotificationRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Defaults to the caller's workspace.
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(rename = "type", alias = "notification_type")]
    pub notification_type: NotificationType,
    #[validate(length(min = 1, max = 200, message = "title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "content must be 1 to 5000 characters"))]
    pub content: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default, alias = "deliveryChannels")]
    pub delivery_channels: Option<DeliveryChannels>,
    #[serde(default, alias = "scheduledFor")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "groupKey")]
    #[validate(length(max = 128, message = "group_key must be at most 128 characters"))]
    pub group_key: Option<String>,
    #[serde(default)]
    pub batch_id: Option<BatchId>,
}

impl CreateNotificationRequest {
    pub fn into_new(self, workspace_id: WorkspaceId, created_by: UserId) -> NewNotification {
        NewNotification {
            user_id: self.user_id,
            workspace_id,
            notification_type: self.notification_type,
            title: self.title,
            content: self.content,
            data: self.data,
            priority: self.priority,
            delivery_channels: self.delivery_channels,
            scheduled_for: self.scheduled_for,
            expires_at: self.expires_at,
            group_key: self.group_key,
            batch_id: self.batch_id,
            created_by,
        }
    }
}

/// `POST /notifications/read-bulk` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkReadRequest {
    #[serde(alias = "notificationIds")]
    #[validate(length(min = 1, message = "at least one id is required"))]
    pub notification_ids: Vec<NotificationId>,
}

/// `POST /admin/workspace-context/invalidate` body.
///
/// Either a workspace event (`{"type": "subscription_changed", ...}`) or a
/// single user (`{"user_id": ...}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InvalidateContextRequest {
    Event(WorkspaceEvent),
    User { user_id: UserId },
}
