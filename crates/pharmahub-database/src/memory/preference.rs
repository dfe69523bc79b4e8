use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use pharmahub_core::result::AppResult;
use pharmahub_core::types::UserId;
use pharmahub_entity::notification::{DigestFrequency, NotificationPreferences};

use crate::repositories::PreferenceRepository;

/// Preferences keyed by user.
#[derive(Debug, Default)]
pub struct MemoryPreferenceRepository {
    rows: DashMap<UserId, NotificationPreferences>,
}

impl MemoryPreferenceRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for MemoryPreferenceRepository {
    async fn find(&self, user_id: UserId) -> AppResult<Option<NotificationPreferences>> {
        Ok(self.rows.get(&user_id).map(|p| p.value().clone()))
    }

    async fn upsert(&self, preferences: &NotificationPreferences) -> AppResult<()> {
        self.rows.insert(preferences.user_id, preferences.clone());
        Ok(())
    }

    async fn find_digest_subscribers(
        &self,
        frequency: DigestFrequency,
    ) -> AppResult<Vec<NotificationPreferences>> {
        Ok(self
            .rows
            .iter()
            .filter(|p| p.digest.enabled && p.digest.frequency == frequency)
            .map(|p| p.value().clone())
            .collect())
    }

    async fn record_digest_sent(
        &self,
        user_id: UserId,
        window_end: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(mut p) = self.rows.get_mut(&user_id) {
            p.digest.last_sent_at = Some(window_end);
        }
        Ok(())
    }
}
