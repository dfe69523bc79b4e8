//! Events exchanged over a live connection.
//!
//! Frames are JSON objects `{"event": "<name>", "data": <payload>}`.
//! Events without a payload omit `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pharmahub_core::types::{NotificationId, UserId, WorkspaceId};
use pharmahub_entity::notification::{Notification, NotificationPreferences, PreferencesUpdate};

use crate::presence::PresenceStatus;

/// Events sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Mark one notification read.
    #[serde(rename = "notification:marked_read")]
    MarkRead { notification_id: NotificationId },
    /// Mark everything in the connection's workspace read.
    #[serde(rename = "notification:mark_all_read")]
    MarkAllRead,
    /// Ask for the most recent unread notifications.
    #[serde(rename = "notification:get_recent")]
    GetRecent {
        #[serde(default)]
        limit: Option<u64>,
    },
    /// Ask for the unread count.
    #[serde(rename = "notification:unread_count")]
    UnreadCount,
    #[serde(rename = "notification:update_preferences")]
    UpdatePreferences(PreferencesUpdate),
    #[serde(rename = "presence:update")]
    PresenceUpdate { status: PresenceStatus },
    #[serde(rename = "conversation:typing")]
    Typing {
        conversation_id: Uuid,
        #[serde(default = "typing_default")]
        is_typing: bool,
    },
    #[serde(rename = "pong")]
    Pong,
}

fn typing_default() -> bool {
    true
}

/// Events sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A new notification for the user.
    #[serde(rename = "notification:received")]
    Received(Box<Notification>),
    /// A notification was read, possibly on another device.
    #[serde(rename = "notification:marked_read")]
    MarkedRead {
        notification_id: NotificationId,
        unread_count: u64,
    },
    #[serde(rename = "notification:unread_count")]
    UnreadCount {
        workspace_id: WorkspaceId,
        count: u64,
    },
    /// Reply to `notification:get_recent`.
    #[serde(rename = "notification:recent")]
    Recent { notifications: Vec<Notification> },
    /// Sent once right after the handshake.
    #[serde(rename = "notification:initial_sync")]
    InitialSync {
        notifications: Vec<Notification>,
        unread_count: u64,
    },
    #[serde(rename = "notification:preferences_updated")]
    PreferencesUpdated(Box<NotificationPreferences>),
    #[serde(rename = "presence:user_presence_changed")]
    PresenceChanged {
        user_id: UserId,
        status: PresenceStatus,
        at: DateTime<Utc>,
    },
    #[serde(rename = "conversation:user_typing")]
    UserTyping {
        conversation_id: Uuid,
        user_id: UserId,
        is_typing: bool,
    },
    #[serde(rename = "ping")]
    Ping { timestamp: i64 },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Error frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received(_) => "notification:received",
            Self::MarkedRead { .. } => "notification:marked_read",
            Self::UnreadCount { .. } => "notification:unread_count",
            Self::Recent { .. } => "notification:recent",
            Self::InitialSync { .. } => "notification:initial_sync",
            Self::PreferencesUpdated(_) => "notification:preferences_updated",
            Self::PresenceChanged { .. } => "presence:user_presence_changed",
            Self::UserTyping { .. } => "conversation:user_typing",
            Self::Ping { .. } => "ping",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
