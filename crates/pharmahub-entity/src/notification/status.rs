//! Notification read/lifecycle status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pharmahub_core::AppError;

/// Lifecycle status of a notification as seen by its owner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "notification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Not yet read.
    #[default]
    Unread,
    /// Read by the owner.
    Read,
    /// Dismissed by the owner.
    Dismissed,
    /// Archived by a sweep.
    Archived,
}

impl NotificationStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Unread => 0,
            Self::Read => 1,
            Self::Dismissed => 2,
            Self::Archived => 3,
        }
    }

    /// Status only moves forward: unread, read, dismissed, archived.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Dismissed and archived notifications receive no further delivery.
    pub fn is_terminal_for_delivery(&self) -> bool {
        matches!(self, Self::Dismissed | Self::Archived)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Dismissed => "dismissed",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "dismissed" => Ok(Self::Dismissed),
            "archived" => Ok(Self::Archived),
            _ => Err(AppError::validation(format!("Invalid status: '{s}'"))),
        }
    }
}
