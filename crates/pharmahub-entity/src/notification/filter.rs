//! Listing filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::NotificationType;
use super::model::Notification;
use super::priority::NotificationPriority;
use super::status::NotificationStatus;

/// Filters accepted by a user's notification listing.
///
/// Without an explicit status, archived notifications are hidden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// Only this type.
    #[serde(default, rename = "type")]
    pub notification_type: Option<NotificationType>,
    /// Only this status.
    #[serde(default)]
    pub status: Option<NotificationStatus>,
    /// Only this priority.
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    /// Created at or after.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Created before.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl NotificationFilter {
    /// Whether `n` passes every filter.
    pub fn matches(&self, n: &Notification) -> bool {
        let status_ok = match self.status {
            Some(status) => n.status == status,
            None => n.status != NotificationStatus::Archived,
        };
        status_ok
            && self.notification_type.is_none_or(|t| n.notification_type == t)
            && self.priority.is_none_or(|p| n.priority == p)
            && self.from.is_none_or(|from| n.created_at >= from)
            && self.to.is_none_or(|to| n.created_at < to)
    }
}
