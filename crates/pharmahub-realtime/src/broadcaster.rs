//! User- and workspace-scoped fan-out with presence.
//!
//! Connections join `user:{id}` implicitly and `workspace:{id}` when the
//! handshake resolved a workspace. Presence online/offline is announced
//! to the workspace group on a user's first and last connection.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pharmahub_core::config::RealtimeConfig;
use pharmahub_core::types::{ConnectionId, UserId, WorkspaceId};
use pharmahub_entity::notification::Notification;
use pharmahub_entity::user::Identity;
use pharmahub_service::RealtimePublisher;

use crate::connection::{ConnectionHandle, ConnectionInfo, ConnectionPool};
use crate::message::ServerEvent;
use crate::metrics::RealtimeMetrics;
use crate::presence::{PresenceStatus, PresenceTracker};

/// Registry of live connections and the fan-out over them.
#[derive(Debug)]
pub struct RealtimeBroadcaster {
    pool: ConnectionPool,
    presence: PresenceTracker,
    metrics: Arc<RealtimeMetrics>,
    config: RealtimeConfig,
}

impl RealtimeBroadcaster {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            pool: ConnectionPool::new(),
            presence: PresenceTracker::new(),
            metrics: Arc::new(RealtimeMetrics::new()),
            config,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Register an authenticated connection.
    ///
    /// Returns the handle and the receiver the transport drains. When the
    /// user is at the connection cap the oldest connection is closed.
    pub fn register(
        &self,
        identity: &Identity,
        workspace_id: Option<WorkspaceId>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let handle = Arc::new(ConnectionHandle::new(identity, workspace_id, tx));

        let existing = self.pool.user_connections(identity.user_id);
        if existing.len() >= self.config.max_connections_per_user
            && let Some(oldest) = existing.first()
        {
            warn!(
                user_id = %identity.user_id,
                max = self.config.max_connections_per_user,
                "User at connection cap, closing oldest"
            );
            oldest.mark_dead();
            if self.pool.remove(oldest.id).is_some() {
                self.metrics.connection_closed();
            }
        }

        let first = self.pool.add(handle.clone());
        self.metrics.connection_opened();
        if first {
            self.presence.set_online(identity.user_id);
            self.announce_presence(&handle, PresenceStatus::Online);
        }

        info!(
            conn_id = %handle.id,
            user_id = %identity.user_id,
            workspace_id = ?workspace_id,
            "Realtime connection registered"
        );
        (handle, rx)
    }

    /// Remove a connection. Announces offline when it was the user's last.
    pub fn unregister(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (handle, last) = self.pool.remove(conn_id)?;
        handle.mark_dead();
        self.metrics.connection_closed();
        if last {
            self.presence.set_offline(handle.user_id);
            self.announce_presence(&handle, PresenceStatus::Offline);
        }
        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            last,
            "Realtime connection unregistered"
        );
        Some(handle)
    }

    /// Change a connected user's status and tell their workspace.
    pub fn update_presence(&self, handle: &ConnectionHandle, status: PresenceStatus) -> bool {
        match self.presence.update_status(handle.user_id, status) {
            Some(status) => {
                self.announce_presence(handle, status);
                true
            }
            None => false,
        }
    }

    fn announce_presence(&self, handle: &ConnectionHandle, status: PresenceStatus) {
        let Some(workspace_id) = handle.workspace_id else {
            return;
        };
        let event = ServerEvent::PresenceChanged {
            user_id: handle.user_id,
            status,
            at: Utc::now(),
        };
        self.send_to_workspace(workspace_id, &event, Some(handle.user_id));
    }

    /// Send to one connection.
    pub fn send_to_connection(&self, handle: &ConnectionHandle, event: &ServerEvent) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };
        let sent = handle.send(frame);
        self.metrics.fan_out(1, usize::from(sent));
        sent
    }

    /// Send to every connection of a user. Returns how many accepted it.
    pub fn send_to_user(&self, user_id: UserId, event: &ServerEvent) -> usize {
        self.fan_out(self.pool.user_connections(user_id), event)
    }

    /// Send to a user's connections other than `except`.
    pub fn send_to_user_except(
        &self,
        user_id: UserId,
        except: ConnectionId,
        event: &ServerEvent,
    ) -> usize {
        let targets = self
            .pool
            .user_connections(user_id)
            .into_iter()
            .filter(|c| c.id != except)
            .collect();
        self.fan_out(targets, event)
    }

    /// Send to every connection in a workspace group, optionally skipping one user.
    pub fn send_to_workspace(
        &self,
        workspace_id: WorkspaceId,
        event: &ServerEvent,
        exclude_user: Option<UserId>,
    ) -> usize {
        let targets = self
            .pool
            .workspace_connections(workspace_id)
            .into_iter()
            .filter(|c| Some(c.user_id) != exclude_user)
            .collect();
        self.fan_out(targets, event)
    }

    fn fan_out(&self, targets: Vec<Arc<ConnectionHandle>>, event: &ServerEvent) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let Some(frame) = encode(event) else {
            return 0;
        };
        let sent = targets
            .iter()
            .filter(|conn| conn.send(frame.clone()))
            .count();
        self.metrics.fan_out(targets.len(), sent);
        debug!(event = event.name(), targets = targets.len(), sent, "Fan-out");
        sent
    }

    pub fn get(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.pool.get(conn_id)
    }

    /// Live connections of a user.
    pub fn user_connection_count(&self, user_id: UserId) -> usize {
        self.pool
            .user_connections(user_id)
            .iter()
            .filter(|c| c.is_alive())
            .count()
    }

    pub fn is_user_connected(&self, user_id: UserId) -> bool {
        self.user_connection_count(user_id) > 0
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.metrics
    }

    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    pub fn user_count(&self) -> usize {
        self.pool.user_count()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.pool.all().iter().map(|c| c.info()).collect()
    }

    /// Close and drop every connection.
    pub fn close_all(&self) -> usize {
        let all = self.pool.all();
        for conn in &all {
            self.unregister(conn.id);
        }
        info!(count = all.len(), "All realtime connections closed");
        all.len()
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!(event = event.name(), error = %e, "Failed to serialize realtime event");
            None
        }
    }
}

impl RealtimePublisher for RealtimeBroadcaster {
    fn push_notification(&self, notification: &Notification) -> usize {
        self.send_to_user(
            notification.user_id,
            &ServerEvent::Received(Box::new(notification.clone())),
        )
    }

    fn connection_count(&self, user_id: UserId) -> usize {
        self.user_connection_count(user_id)
    }
}
