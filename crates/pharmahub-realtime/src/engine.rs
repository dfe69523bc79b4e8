//! Connection lifecycle and inbound event routing.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pharmahub_core::error::AppError;
use pharmahub_core::types::{ConnectionId, WorkspaceId};
use pharmahub_entity::user::Identity;
use pharmahub_service::{NotificationStore, PreferenceService};

use crate::broadcaster::RealtimeBroadcaster;
use crate::connection::ConnectionHandle;
use crate::connection::heartbeat::{HeartbeatConfig, run_heartbeat};
use crate::message::{ClientEvent, ServerEvent};

/// Ties the broadcaster to the notification store.
///
/// Transports call [`RealtimeEngine::connect`] after the handshake, feed
/// every text frame to [`RealtimeEngine::handle_inbound`] and call
/// [`RealtimeEngine::disconnect`] when the socket closes.
#[derive(Clone)]
pub struct RealtimeEngine {
    broadcaster: Arc<RealtimeBroadcaster>,
    store: Arc<NotificationStore>,
    preferences: PreferenceService,
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.broadcaster.connection_count())
            .finish_non_exhaustive()
    }
}

impl RealtimeEngine {
    pub fn new(
        broadcaster: Arc<RealtimeBroadcaster>,
        store: Arc<NotificationStore>,
        preferences: PreferenceService,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            broadcaster,
            store,
            preferences,
            shutdown_tx,
        }
    }

    pub fn broadcaster(&self) -> &Arc<RealtimeBroadcaster> {
        &self.broadcaster
    }

    /// Register the connection and send the initial sync.
    pub async fn connect(
        &self,
        identity: &Identity,
        workspace_id: Option<WorkspaceId>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (handle, rx) = self.broadcaster.register(identity, workspace_id);
        if let Some(workspace_id) = workspace_id {
            self.initial_sync(&handle, workspace_id).await;
        }
        (handle, rx)
    }

    async fn initial_sync(&self, handle: &ConnectionHandle, workspace_id: WorkspaceId) {
        let limit = self.broadcaster.config().initial_sync_limit;
        match self
            .store
            .initial_sync(handle.user_id, workspace_id, limit)
            .await
        {
            Ok((notifications, unread_count)) => {
                debug!(
                    conn_id = %handle.id,
                    items = notifications.len(),
                    unread_count,
                    "Initial sync"
                );
                self.broadcaster.send_to_connection(
                    handle,
                    &ServerEvent::UnreadCount {
                        workspace_id,
                        count: unread_count,
                    },
                );
                self.broadcaster.send_to_connection(
                    handle,
                    &ServerEvent::InitialSync {
                        notifications,
                        unread_count,
                    },
                );
            }
            Err(e) => {
                warn!(conn_id = %handle.id, error = %e, "Initial sync failed");
                self.reply_error(handle, &e);
            }
        }
    }

    /// Spawn the keepalive loop for a connection.
    pub fn spawn_heartbeat(&self, handle: Arc<ConnectionHandle>) -> JoinHandle<()> {
        let config = HeartbeatConfig::from(self.broadcaster.config());
        tokio::spawn(run_heartbeat(self.broadcaster.clone(), handle, config))
    }

    /// Drop a connection after the transport closed.
    pub fn disconnect(&self, conn_id: ConnectionId) {
        self.broadcaster.unregister(conn_id);
    }

    /// Route one text frame from a client.
    pub async fn handle_inbound(&self, conn_id: ConnectionId, raw: &str) {
        let Some(handle) = self.broadcaster.get(conn_id) else {
            warn!(conn_id = %conn_id, "Frame from unknown connection");
            return;
        };
        self.broadcaster.metrics().message_received();

        let event: ClientEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                self.broadcaster.metrics().invalid_message();
                self.broadcaster.send_to_connection(
                    &handle,
                    &ServerEvent::error("INVALID_MESSAGE", format!("Failed to parse event: {e}")),
                );
                return;
            }
        };

        if let Err(e) = self.route(&handle, event).await {
            self.reply_error(&handle, &e);
        }
    }

    async fn route(&self, handle: &ConnectionHandle, event: ClientEvent) -> Result<(), AppError> {
        let user_id = handle.user_id;
        match event {
            ClientEvent::MarkRead { notification_id } => {
                let receipt = self.store.mark_as_read(notification_id, user_id).await?;
                self.broadcaster.send_to_user(
                    user_id,
                    &ServerEvent::MarkedRead {
                        notification_id,
                        unread_count: receipt.unread_count,
                    },
                );
            }
            ClientEvent::MarkAllRead => {
                let workspace_id = require_workspace(handle)?;
                let changed = self.store.mark_all_as_read(user_id, workspace_id).await?;
                let count = self.store.unread_count(user_id, workspace_id).await?;
                debug!(%user_id, changed, "Marked all read over realtime");
                self.broadcaster.send_to_user(
                    user_id,
                    &ServerEvent::UnreadCount {
                        workspace_id,
                        count,
                    },
                );
            }
            ClientEvent::GetRecent { limit } => {
                let workspace_id = require_workspace(handle)?;
                let limit = limit.unwrap_or(self.broadcaster.config().initial_sync_limit);
                let notifications = self
                    .store
                    .recent_unread(user_id, workspace_id, limit)
                    .await?;
                self.broadcaster
                    .send_to_connection(handle, &ServerEvent::Recent { notifications });
            }
            ClientEvent::UnreadCount => {
                let workspace_id = require_workspace(handle)?;
                let count = self.store.unread_count(user_id, workspace_id).await?;
                self.broadcaster.send_to_connection(
                    handle,
                    &ServerEvent::UnreadCount {
                        workspace_id,
                        count,
                    },
                );
            }
            ClientEvent::UpdatePreferences(update) => {
                let prefs = self.preferences.update(user_id, update).await?;
                self.broadcaster.send_to_user(
                    user_id,
                    &ServerEvent::PreferencesUpdated(Box::new(prefs)),
                );
            }
            ClientEvent::PresenceUpdate { status } => {
                if !self.broadcaster.update_presence(handle, status) {
                    return Err(AppError::validation(format!(
                        "Presence cannot be set to '{status}'"
                    )));
                }
            }
            ClientEvent::Typing {
                conversation_id,
                is_typing,
            } => {
                let workspace_id = require_workspace(handle)?;
                self.broadcaster.send_to_workspace(
                    workspace_id,
                    &ServerEvent::UserTyping {
                        conversation_id,
                        user_id,
                        is_typing,
                    },
                    Some(user_id),
                );
            }
            ClientEvent::Pong => handle.record_pong(chrono::Utc::now()),
        }
        Ok(())
    }

    fn reply_error(&self, handle: &ConnectionHandle, err: &AppError) {
        let message = if err.is_client_error() {
            err.message.clone()
        } else {
            error!(conn_id = %handle.id, error = %err, "Realtime event failed");
            "Internal error".to_string()
        };
        self.broadcaster
            .send_to_connection(handle, &ServerEvent::error(err.kind.to_string(), message));
    }

    /// Receiver notified when the engine shuts down.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal transports and close every connection.
    pub fn shutdown(&self) {
        info!("Shutting down realtime engine");
        let _ = self.shutdown_tx.send(());
        self.broadcaster.close_all();
    }
}

fn require_workspace(handle: &ConnectionHandle) -> Result<WorkspaceId, AppError> {
    handle
        .workspace_id
        .ok_or_else(|| AppError::authorization("Connection has no workspace"))
}
