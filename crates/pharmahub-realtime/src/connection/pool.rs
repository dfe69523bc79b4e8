//! Two-level connection registry: user scope and workspace scope.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use pharmahub_core::types::{ConnectionId, UserId, WorkspaceId};

use super::handle::ConnectionHandle;

/// Thread-safe pool of live connections.
///
/// Every map is sharded; mutations for one user or workspace lock only
/// that key's shard.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    by_user: DashMap<UserId, Vec<Arc<ConnectionHandle>>>,
    by_workspace: DashMap<WorkspaceId, HashSet<UserId>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns true if it is the user's first.
    ///
    /// The user's entry stays locked while the workspace group is updated,
    /// so adds and removes for one user apply in order.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> bool {
        self.by_id.insert(handle.id, handle.clone());
        let mut connections = self.by_user.entry(handle.user_id).or_default();
        if let Some(workspace_id) = handle.workspace_id {
            self.by_workspace
                .entry(workspace_id)
                .or_default()
                .insert(handle.user_id);
        }
        let first = connections.is_empty();
        connections.push(handle);
        first
    }

    /// Remove a connection. Returns it and whether it was the user's last.
    pub fn remove(&self, conn_id: ConnectionId) -> Option<(Arc<ConnectionHandle>, bool)> {
        let (_, handle) = self.by_id.remove(&conn_id)?;
        let user_id = handle.user_id;

        let Entry::Occupied(mut entry) = self.by_user.entry(user_id) else {
            return Some((handle, false));
        };
        entry.get_mut().retain(|c| c.id != conn_id);

        if let Some(workspace_id) = handle.workspace_id
            && !entry
                .get()
                .iter()
                .any(|c| c.workspace_id == Some(workspace_id))
        {
            if let Some(mut users) = self.by_workspace.get_mut(&workspace_id) {
                users.remove(&user_id);
            }
            self.by_workspace
                .remove_if(&workspace_id, |_, users| users.is_empty());
        }

        let last = entry.get().is_empty();
        if last {
            entry.remove();
        }
        Some((handle, last))
    }

    pub fn get(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(&conn_id).map(|entry| entry.value().clone())
    }

    /// All connections of a user, oldest first.
    pub fn user_connections(&self, user_id: UserId) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Users with at least one connection in the workspace group.
    pub fn workspace_users(&self, workspace_id: WorkspaceId) -> Vec<UserId> {
        self.by_workspace
            .get(&workspace_id)
            .map(|entry| entry.value().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Connections that joined the workspace group.
    pub fn workspace_connections(&self, workspace_id: WorkspaceId) -> Vec<Arc<ConnectionHandle>> {
        self.workspace_users(workspace_id)
            .into_iter()
            .flat_map(|user_id| self.user_connections(user_id))
            .filter(|c| c.workspace_id == Some(workspace_id))
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
