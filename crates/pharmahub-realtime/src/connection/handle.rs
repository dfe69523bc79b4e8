//! A single live connection.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use pharmahub_core::types::{ConnectionId, UserId, WorkspaceId};
use pharmahub_entity::user::{Identity, UserRole};

/// Handle to one authenticated connection.
///
/// Outbound frames are pre-serialized JSON pushed through a bounded
/// channel; the transport task drains it in order.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    /// Workspace group the connection joined, if any.
    pub workspace_id: Option<WorkspaceId>,
    pub role: UserRole,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    last_pong_ms: AtomicI64,
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a handle for `identity` in `workspace_id`.
    pub fn new(
        identity: &Identity,
        workspace_id: Option<WorkspaceId>,
        sender: mpsc::Sender<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            user_id: identity.user_id,
            workspace_id,
            role: identity.role,
            connected_at: now,
            sender,
            last_pong_ms: AtomicI64::new(now.timestamp_millis()),
            alive: AtomicBool::new(true),
        }
    }

    /// Queue a frame. Returns false if the connection is dead or its buffer is full.
    pub fn send(&self, frame: String) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Connection send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop accepting frames. The transport notices the closed stream.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Record a pong from the client.
    pub fn record_pong(&self, at: DateTime<Utc>) {
        self.last_pong_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    /// Time of the last pong (or of the handshake).
    pub fn last_pong(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_pong_ms.load(Ordering::Relaxed))
            .unwrap_or(self.connected_at)
    }

    /// Serializable snapshot.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id,
            workspace_id: self.workspace_id,
            role: self.role,
            connected_at: self.connected_at,
            last_pong: self.last_pong(),
            alive: self.is_alive(),
        }
    }
}

/// Snapshot of a connection for admin views.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub workspace_id: Option<WorkspaceId>,
    pub role: UserRole,
    pub connected_at: DateTime<Utc>,
    pub last_pong: DateTime<Utc>,
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_until_closed() {
        let identity = Identity::new(UserId::new(), None, UserRole::Staff);
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(&identity, None, tx);

        assert!(handle.send("a".into()));
        assert!(!handle.send("b".into()), "buffer of one is full");
        assert_eq!(rx.recv().await.as_deref(), Some("a"));

        drop(rx);
        assert!(!handle.send("c".into()));
        assert!(!handle.is_alive());
    }
}
