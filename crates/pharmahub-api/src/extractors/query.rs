//! Listing query parameters.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use pharmahub_entity::notification::{
    NotificationFilter, NotificationPriority, NotificationStatus, NotificationType,
};

/// `GET /notifications` query: filters plus `limit`/`offset`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default, rename = "type")]
    pub notification_type: Option<NotificationType>,
    #[serde(default)]
    pub status: Option<NotificationStatus>,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl ListNotificationsQuery {
    pub fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            notification_type: self.notification_type,
            status: self.status,
            priority: self.priority,
            from: self.from,
            to: self.to,
        }
    }
}
