//! Presence tracker: current status per connected user.

use dashmap::DashMap;

use pharmahub_core::types::UserId;

use super::status::PresenceStatus;

/// Tracks presence for users with at least one live connection.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    statuses: DashMap<UserId, PresenceStatus>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, user_id: UserId) {
        self.statuses.insert(user_id, PresenceStatus::Online);
    }

    pub fn set_offline(&self, user_id: UserId) {
        self.statuses.remove(&user_id);
    }

    /// Change a connected user's status. Offline users stay offline; going
    /// offline is only driven by the last connection closing.
    pub fn update_status(&self, user_id: UserId, status: PresenceStatus) -> Option<PresenceStatus> {
        if status == PresenceStatus::Offline {
            return None;
        }
        let mut entry = self.statuses.get_mut(&user_id)?;
        *entry = status;
        Some(status)
    }

    pub fn status(&self, user_id: UserId) -> PresenceStatus {
        self.statuses
            .get(&user_id)
            .map(|entry| *entry.value())
            .unwrap_or(PresenceStatus::Offline)
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.statuses.contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.statuses.len()
    }
}
