//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmahub_core::types::{BatchId, NotificationId, UserId, WorkspaceId};

use super::channel::{Channel, DeliveryChannels};
use super::delivery::{DeliveryAttempt, DeliveryStatus};
use super::kind::NotificationType;
use super::priority::NotificationPriority;
use super::status::NotificationStatus;

/// A notification addressed to one user within one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The recipient.
    pub user_id: UserId,
    /// Tenant scope.
    pub workspace_id: WorkspaceId,
    /// Event type that produced the notification.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Short title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// References to the originating objects (conversation, message, patient, ...).
    pub data: serde_json::Value,
    /// Priority level.
    pub priority: NotificationPriority,
    /// Read/lifecycle status.
    pub status: NotificationStatus,
    /// Channels requested by the creator.
    pub delivery_channels: DeliveryChannels,
    /// One record per requested channel.
    pub delivery_status: Vec<DeliveryAttempt>,
    /// Do not deliver before this time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Inert after this time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Deduplication key.
    pub group_key: Option<String>,
    /// Batch this notification belongs to (digests).
    pub batch_id: Option<BatchId>,
    /// Actor that created the notification.
    pub created_by: UserId,
    /// Set once the first delivery pass has claimed the notification.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// When the owner read it.
    pub read_at: Option<DateTime<Utc>>,
    /// When the owner dismissed it.
    pub dismissed_at: Option<DateTime<Utc>>,
    /// When a sweep archived it.
    pub archived_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: UserId,
    /// Tenant scope.
    pub workspace_id: WorkspaceId,
    /// Event type.
    pub notification_type: NotificationType,
    /// Short title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Structured references.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Defaults to normal.
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    /// Defaults to the type's channel set.
    #[serde(default)]
    pub delivery_channels: Option<DeliveryChannels>,
    /// Optional delayed delivery.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Optional deduplication key.
    #[serde(default)]
    pub group_key: Option<String>,
    /// Optional batch.
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    /// Creating actor.
    pub created_by: UserId,
}

impl NewNotification {
    /// Minimal input; optional fields start empty.
    pub fn new(
        user_id: UserId,
        workspace_id: WorkspaceId,
        notification_type: NotificationType,
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        Self {
            user_id,
            workspace_id,
            notification_type,
            title: title.into(),
            content: content.into(),
            data: None,
            priority: None,
            delivery_channels: None,
            scheduled_for: None,
            expires_at: None,
            group_key: None,
            batch_id: None,
            created_by,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the requested channels.
    pub fn with_channels(mut self, channels: DeliveryChannels) -> Self {
        self.delivery_channels = Some(channels);
        self
    }

    /// Set the structured payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Delay delivery until `at`.
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    /// Expire at `at`.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Attach a deduplication key.
    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }
}

impl Notification {
    /// Materialize a new record from validated input.
    pub fn from_new(input: NewNotification, now: DateTime<Utc>) -> Self {
        let channels = input
            .delivery_channels
            .unwrap_or_else(|| input.notification_type.default_channels());
        let delivery_status = channels
            .requested()
            .into_iter()
            .map(DeliveryAttempt::pending)
            .collect();

        Self {
            id: NotificationId::new(),
            user_id: input.user_id,
            workspace_id: input.workspace_id,
            notification_type: input.notification_type,
            title: input.title,
            content: input.content,
            data: input.data.unwrap_or_else(|| serde_json::json!({})),
            priority: input.priority.unwrap_or_default(),
            status: NotificationStatus::Unread,
            delivery_channels: channels,
            delivery_status,
            scheduled_for: input.scheduled_for,
            expires_at: input.expires_at,
            group_key: input.group_key,
            batch_id: input.batch_id,
            created_by: input.created_by,
            dispatched_at: None,
            read_at: None,
            dismissed_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the notification is unread.
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }

    /// Check if the notification has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Whether `scheduled_for` has been reached (or was never set).
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.is_none_or(|at| at <= now)
    }

    /// Dismissed, archived and expired notifications receive no delivery.
    pub fn is_inert_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_terminal_for_delivery() || self.is_expired_at(now)
    }

    /// The delivery record for `channel`, if requested.
    pub fn delivery(&self, channel: Channel) -> Option<&DeliveryAttempt> {
        self.delivery_status.iter().find(|d| d.channel == channel)
    }

    /// Mutable delivery record for `channel`, created if missing.
    pub fn delivery_mut(&mut self, channel: Channel) -> &mut DeliveryAttempt {
        let idx = match self.delivery_status.iter().position(|d| d.channel == channel) {
            Some(idx) => idx,
            None => {
                self.delivery_status.push(DeliveryAttempt::pending(channel));
                self.delivery_status.len() - 1
            }
        };
        &mut self.delivery_status[idx]
    }

    /// Status of `channel`, if requested.
    pub fn channel_status(&self, channel: Channel) -> Option<DeliveryStatus> {
        self.delivery(channel).map(|d| d.status)
    }

    /// Whether any channel is failed, under the cap, and past its backoff.
    pub fn has_retryable_channel(&self, max_attempts: u32, now: DateTime<Utc>) -> bool {
        self.delivery_status
            .iter()
            .any(|d| d.can_retry(max_attempts) && d.is_due(now))
    }

    /// Whether a quiet-hours deferral has come due.
    pub fn has_due_deferral(&self, now: DateTime<Utc>) -> bool {
        self.delivery_status
            .iter()
            .any(|d| d.is_deferred() && d.is_due(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> NewNotification {
        NewNotification::new(
            UserId::new(),
            WorkspaceId::new(),
            NotificationType::PatientQuery,
            "New patient query",
            "Mrs. Doe asked about her refill",
            UserId::new(),
        )
    }

    #[test]
    fn test_from_new_uses_type_default_channels() {
        let n = Notification::from_new(sample(), Utc::now());
        assert!(n.delivery_channels.in_app);
        assert!(n.delivery_channels.email);
        assert_eq!(n.delivery_status.len(), 2);
        assert_eq!(n.priority, NotificationPriority::Normal);
        assert!(n.is_unread());
    }

    #[test]
    fn test_explicit_channels_override_defaults() {
        let n = Notification::from_new(
            sample().with_channels(DeliveryChannels::IN_APP),
            Utc::now(),
        );
        assert_eq!(n.delivery_status.len(), 1);
        assert_eq!(n.channel_status(Channel::InApp), Some(DeliveryStatus::Pending));
        assert_eq!(n.channel_status(Channel::Email), None);
    }

    #[test]
    fn test_due_and_expiry() {
        let now = Utc::now();
        let n = Notification::from_new(
            sample()
                .scheduled_for(now + Duration::minutes(10))
                .expires_at(now + Duration::hours(1)),
            now,
        );
        assert!(!n.is_due_at(now));
        assert!(n.is_due_at(now + Duration::minutes(10)));
        assert!(!n.is_inert_at(now));
        assert!(n.is_inert_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_type_serialized_as_type_field() {
        let n = Notification::from_new(sample(), Utc::now());
        let json = serde_json::to_value(&n).expect("serialize");
        assert_eq!(json["type"], "patient_query");
        assert_eq!(json["status"], "unread");
    }
}
