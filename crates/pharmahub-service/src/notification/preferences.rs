//! Per-user notification preferences.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use pharmahub_cache::{CacheManager, keys};
use pharmahub_core::result::AppResult;
use pharmahub_core::traits::CacheProvider;
use pharmahub_core::types::UserId;
use pharmahub_database::PreferenceRepository;
use pharmahub_entity::notification::{DigestFrequency, NotificationPreferences, PreferencesUpdate};

use crate::delivery::quiet_hours;

/// Reads and writes preferences, with a read-through cache.
///
/// A user without stored preferences gets the defaults persisted on first
/// access.
#[derive(Clone)]
pub struct PreferenceService {
    repo: Arc<dyn PreferenceRepository>,
    cache: CacheManager,
}

impl PreferenceService {
    /// Creates a new preference service.
    pub fn new(repo: Arc<dyn PreferenceRepository>, cache: CacheManager) -> Self {
        Self { repo, cache }
    }

    /// Preferences of `user_id`, created with defaults if absent.
    pub async fn get(&self, user_id: UserId) -> AppResult<NotificationPreferences> {
        self.get_at(user_id, Utc::now()).await
    }

    /// [`Self::get`] with an explicit clock.
    pub async fn get_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<NotificationPreferences> {
        let key = keys::preferences(user_id);
        match self.cache.get_json::<NotificationPreferences>(&key).await {
            Ok(Some(prefs)) => return Ok(prefs),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Preference cache read failed"),
        }

        let prefs = match self.repo.find(user_id).await? {
            Some(prefs) => prefs,
            None => {
                let prefs = NotificationPreferences::default_for_user(user_id, now);
                self.repo.upsert(&prefs).await?;
                info!(%user_id, "Created default notification preferences");
                prefs
            }
        };
        self.store_cached(&prefs).await;
        Ok(prefs)
    }

    /// Apply a partial update and return the stored result.
    pub async fn update(
        &self,
        user_id: UserId,
        update: PreferencesUpdate,
    ) -> AppResult<NotificationPreferences> {
        if let Some(quiet) = &update.quiet_hours {
            quiet_hours::validate(quiet)?;
        }
        let now = Utc::now();
        let mut prefs = self.get_at(user_id, now).await?;
        prefs.apply(update, now);
        self.repo.upsert(&prefs).await?;
        self.store_cached(&prefs).await;
        info!(%user_id, "Notification preferences updated");
        Ok(prefs)
    }

    /// Users receiving digests at `frequency`.
    pub async fn digest_subscribers(
        &self,
        frequency: DigestFrequency,
    ) -> AppResult<Vec<NotificationPreferences>> {
        self.repo.find_digest_subscribers(frequency).await
    }

    /// Record the end of the digest window just sent.
    pub async fn record_digest_sent(
        &self,
        user_id: UserId,
        window_end: DateTime<Utc>,
    ) -> AppResult<()> {
        self.repo.record_digest_sent(user_id, window_end).await?;
        if let Err(e) = self.cache.delete(&keys::preferences(user_id)).await {
            warn!(error = %e, "Preference cache eviction failed");
        }
        Ok(())
    }

    async fn store_cached(&self, prefs: &NotificationPreferences) {
        if let Err(e) = self
            .cache
            .put_json(&keys::preferences(prefs.user_id), prefs)
            .await
        {
            warn!(error = %e, "Preference cache write failed");
        }
    }
}

impl std::fmt::Debug for PreferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmahub_database::memory::MemoryPreferenceRepository;
    use pharmahub_entity::notification::{Channel, NotificationType, QuietHours};

    fn service() -> (PreferenceService, Arc<MemoryPreferenceRepository>) {
        let repo = Arc::new(MemoryPreferenceRepository::new());
        (
            PreferenceService::new(repo.clone(), CacheManager::in_memory()),
            repo,
        )
    }

    #[tokio::test]
    async fn test_defaults_are_persisted_on_first_read() {
        let (svc, repo) = service();
        let user = UserId::new();
        assert!(repo.find(user).await.unwrap().is_none());

        let prefs = svc.get(user).await.unwrap();
        assert!(prefs.allows(Channel::InApp, NotificationType::NewMessage));
        assert_eq!(repo.find(user).await.unwrap(), Some(prefs));
    }

    #[tokio::test]
    async fn test_update_overwrites_cached_copy() {
        let (svc, _) = service();
        let user = UserId::new();
        svc.get(user).await.unwrap();

        let update = PreferencesUpdate {
            digest_enabled: Some(true),
            digest_frequency: Some(DigestFrequency::Weekly),
            ..Default::default()
        };
        svc.update(user, update).await.unwrap();

        let prefs = svc.get(user).await.unwrap();
        assert!(prefs.digest.enabled);
        assert_eq!(prefs.digest.frequency, DigestFrequency::Weekly);
        assert_eq!(svc.digest_subscribers(DigestFrequency::Weekly).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_quiet_hours_rejected() {
        let (svc, _) = service();
        let update = PreferencesUpdate {
            quiet_hours: Some(QuietHours {
                enabled: true,
                start: "10pm".into(),
                end: "07:00".into(),
                timezone: "UTC".into(),
            }),
            ..Default::default()
        };
        let err = svc.update(UserId::new(), update).await.unwrap_err();
        assert!(err.is_client_error());
    }
}
