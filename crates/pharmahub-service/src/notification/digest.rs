//! Digest batching.
//!
//! For every user opted into digests at a frequency, unread notifications
//! from the current window are grouped by type into one summary
//! notification per workspace, which is then delivered like any other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use pharmahub_core::result::AppResult;
use pharmahub_core::types::{BatchId, UserId, WorkspaceId};
use pharmahub_database::NotificationRepository;
use pharmahub_entity::notification::{
    DeliveryChannels, DigestFrequency, NewNotification, Notification, NotificationPreferences,
    NotificationPriority, NotificationType,
};

use super::preferences::PreferenceService;
use super::store::NotificationStore;

/// Actor recorded on notifications the system produces itself.
pub const SYSTEM_ACTOR: UserId = UserId(uuid::Uuid::nil());

/// Summary of one digest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestRunReport {
    /// Subscribers at the frequency.
    pub users: usize,
    /// Digest notifications created.
    pub digests: usize,
    /// Users whose digest could not be built.
    pub failed: usize,
}

/// Builds and sends digests.
pub struct DigestService {
    notifications: Arc<dyn NotificationRepository>,
    preferences: PreferenceService,
    store: Arc<NotificationStore>,
    items_per_type: usize,
}

impl DigestService {
    /// Creates a new digest service.
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        preferences: PreferenceService,
        store: Arc<NotificationStore>,
        items_per_type: usize,
    ) -> Self {
        Self {
            notifications,
            preferences,
            store,
            items_per_type: items_per_type.max(1),
        }
    }

    /// Run the digest for every subscriber at `frequency`.
    pub async fn run(&self, frequency: DigestFrequency) -> AppResult<DigestRunReport> {
        self.run_at(frequency, Utc::now()).await
    }

    /// [`Self::run`] with an explicit clock.
    ///
    /// One user's failure is logged and does not stop the run.
    pub async fn run_at(
        &self,
        frequency: DigestFrequency,
        now: DateTime<Utc>,
    ) -> AppResult<DigestRunReport> {
        let subscribers = self.preferences.digest_subscribers(frequency).await?;
        let mut report = DigestRunReport {
            users: subscribers.len(),
            ..Default::default()
        };

        for prefs in &subscribers {
            match self.digest_for_user(prefs, frequency, now).await {
                Ok(created) => report.digests += created,
                Err(e) => {
                    warn!(user_id = %prefs.user_id, %frequency, error = %e, "Digest failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            %frequency,
            users = report.users,
            digests = report.digests,
            failed = report.failed,
            "Digest run finished"
        );
        Ok(report)
    }

    async fn digest_for_user(
        &self,
        prefs: &NotificationPreferences,
        frequency: DigestFrequency,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let window_start = window_start(prefs, frequency, now);
        let unread = self
            .notifications
            .find_unread_between(prefs.user_id, window_start, now)
            .await?;

        let mut by_workspace: HashMap<WorkspaceId, Vec<Notification>> = HashMap::new();
        for n in unread {
            by_workspace.entry(n.workspace_id).or_default().push(n);
        }

        let channels = digest_channels(prefs);
        let batch_id = BatchId::new();
        let mut created = 0;
        for (workspace_id, items) in by_workspace {
            let summary = DigestSummary::build(&items, self.items_per_type);
            let mut input = NewNotification::new(
                prefs.user_id,
                workspace_id,
                NotificationType::Digest,
                summary.title(frequency),
                summary.content(),
                SYSTEM_ACTOR,
            )
            .with_priority(NotificationPriority::Low)
            .with_channels(channels)
            .with_data(summary.payload(frequency, window_start, now));
            input.batch_id = Some(batch_id);

            self.store.create_at(input, now).await?;
            created += 1;
        }

        self.preferences
            .record_digest_sent(prefs.user_id, now)
            .await?;
        Ok(created)
    }
}

impl std::fmt::Debug for DigestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestService")
            .field("items_per_type", &self.items_per_type)
            .finish_non_exhaustive()
    }
}

/// Later of the last digest and one period ago.
fn window_start(
    prefs: &NotificationPreferences,
    frequency: DigestFrequency,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let period_start = now - frequency.period();
    prefs
        .digest
        .last_sent_at
        .map_or(period_start, |last| last.max(period_start))
}

fn digest_channels(prefs: &NotificationPreferences) -> DeliveryChannels {
    let enabled = prefs.enabled_channels();
    if enabled.is_empty() {
        DeliveryChannels::IN_APP
    } else {
        DeliveryChannels::from_channels(&enabled)
    }
}

#[derive(Debug, Serialize)]
struct DigestItem {
    id: String,
    title: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct DigestGroup {
    #[serde(rename = "type")]
    kind: NotificationType,
    label: &'static str,
    count: usize,
    items: Vec<DigestItem>,
}

#[derive(Debug)]
struct DigestSummary {
    total: usize,
    groups: Vec<DigestGroup>,
}

impl DigestSummary {
    /// Group `items` by type, largest group first.
    fn build(items: &[Notification], items_per_type: usize) -> Self {
        let mut grouped: BTreeMap<NotificationType, Vec<&Notification>> = BTreeMap::new();
        for n in items {
            grouped.entry(n.notification_type).or_default().push(n);
        }

        let mut groups: Vec<DigestGroup> = grouped
            .into_iter()
            .map(|(kind, members)| DigestGroup {
                kind,
                label: kind.digest_label(),
                count: members.len(),
                items: members
                    .iter()
                    .take(items_per_type)
                    .map(|n| DigestItem {
                        id: n.id.to_string(),
                        title: n.title.clone(),
                        created_at: n.created_at,
                    })
                    .collect(),
            })
            .collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count).then(a.kind.cmp(&b.kind)));

        Self {
            total: items.len(),
            groups,
        }
    }

    fn title(&self, frequency: DigestFrequency) -> String {
        let noun = if self.total == 1 {
            "notification"
        } else {
            "notifications"
        };
        format!(
            "Your {frequency} digest: {} unread {noun}",
            self.total
        )
    }

    fn content(&self) -> String {
        self.groups
            .iter()
            .map(|g| format!("{} ({})", g.label, g.count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn payload(
        &self,
        frequency: DigestFrequency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> serde_json::Value {
        json!({
            "frequency": frequency,
            "window": { "from": from, "to": to },
            "total": self.total,
            "groups": self.groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pharmahub_cache::CacheManager;
    use pharmahub_core::config::NotificationConfig;
    use pharmahub_database::PreferenceRepository;
    use pharmahub_database::memory::{MemoryNotificationRepository, MemoryPreferenceRepository};
    use pharmahub_entity::notification::{DigestSettings, NotificationFilter};

    use crate::delivery::channel::ChannelRegistry;
    use crate::delivery::dispatcher::DeliveryDispatcher;
    use crate::delivery::publisher::NoopPublisher;

    struct Fixture {
        digests: DigestService,
        store: Arc<NotificationStore>,
        notifications: Arc<MemoryNotificationRepository>,
        prefs: Arc<MemoryPreferenceRepository>,
    }

    fn fixture() -> Fixture {
        let notifications = Arc::new(MemoryNotificationRepository::new());
        let prefs = Arc::new(MemoryPreferenceRepository::new());
        let cache = CacheManager::in_memory();
        let preferences = PreferenceService::new(prefs.clone(), cache.clone());
        let config = NotificationConfig::default();
        let dispatcher = Arc::new(DeliveryDispatcher::new(
            notifications.clone(),
            preferences.clone(),
            Arc::new(NoopPublisher),
            ChannelRegistry::new(),
            &config,
        ));
        let store = Arc::new(NotificationStore::new(
            notifications.clone(),
            dispatcher,
            cache,
            config.clone(),
        ));
        Fixture {
            digests: DigestService::new(
                notifications.clone(),
                preferences,
                store.clone(),
                config.digest_items_per_type,
            ),
            store,
            notifications,
            prefs,
        }
    }

    async fn subscribe(f: &Fixture, user: UserId, frequency: DigestFrequency, now: DateTime<Utc>) {
        let mut prefs = NotificationPreferences::default_for_user(user, now);
        prefs.digest = DigestSettings {
            enabled: true,
            frequency,
            last_sent_at: None,
        };
        f.prefs.upsert(&prefs).await.unwrap();
    }

    async fn unread(f: &Fixture, user: UserId, ws: WorkspaceId, kind: NotificationType, at: DateTime<Utc>) {
        let input = NewNotification::new(user, ws, kind, format!("{kind} item"), "details", UserId::new());
        f.store.create_at(input, at).await.unwrap();
    }

    async fn digests_of(f: &Fixture, user: UserId, ws: WorkspaceId) -> Vec<Notification> {
        let filter = NotificationFilter {
            notification_type: Some(NotificationType::Digest),
            ..Default::default()
        };
        let page = f.store.page_request(Some(50), None);
        f.notifications
            .find_for_user(user, ws, &filter, &page)
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_daily_digest_groups_by_type() {
        let f = fixture();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let now = Utc::now();
        subscribe(&f, user, DigestFrequency::Daily, now - Duration::days(3)).await;

        let earlier = now - Duration::hours(3);
        for kind in [
            NotificationType::NewMessage,
            NotificationType::NewMessage,
            NotificationType::Mention,
            NotificationType::Mention,
            NotificationType::PatientQuery,
        ] {
            unread(&f, user, ws, kind, earlier).await;
        }

        let report = f.digests.run_at(DigestFrequency::Daily, now).await.unwrap();
        assert_eq!(report.users, 1);
        assert_eq!(report.digests, 1);

        let digests = digests_of(&f, user, ws).await;
        assert_eq!(digests.len(), 1);
        let payload = &digests[0].data;
        assert_eq!(payload["total"], 5);
        assert_eq!(payload["frequency"], "daily");
        let groups = payload["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        let count_of = |kind: &str| {
            groups
                .iter()
                .find(|g| g["type"] == kind)
                .map(|g| g["count"].as_u64().unwrap())
        };
        assert_eq!(count_of("new_message"), Some(2));
        assert_eq!(count_of("mention"), Some(2));
        assert_eq!(count_of("patient_query"), Some(1));
        assert_eq!(groups[2]["type"], "patient_query");
        assert_eq!(digests[0].created_by, SYSTEM_ACTOR);
    }

    #[tokio::test]
    async fn test_window_starts_at_last_digest() {
        let f = fixture();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let now = Utc::now();
        subscribe(&f, user, DigestFrequency::Daily, now - Duration::days(3)).await;
        unread(&f, user, ws, NotificationType::Mention, now - Duration::hours(5)).await;

        let first_run = now - Duration::hours(2);
        f.digests.run_at(DigestFrequency::Daily, first_run).await.unwrap();
        assert_eq!(digests_of(&f, user, ws).await.len(), 1);

        // Nothing new since the last digest, and the digest itself is excluded.
        let report = f.digests.run_at(DigestFrequency::Daily, now).await.unwrap();
        assert_eq!(report.digests, 0);
        assert_eq!(digests_of(&f, user, ws).await.len(), 1);
    }

    #[tokio::test]
    async fn test_other_frequencies_untouched() {
        let f = fixture();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let now = Utc::now();
        subscribe(&f, user, DigestFrequency::Weekly, now).await;
        unread(&f, user, ws, NotificationType::Mention, now - Duration::minutes(10)).await;

        let report = f.digests.run_at(DigestFrequency::Hourly, now).await.unwrap();
        assert_eq!(report.users, 0);
        assert!(digests_of(&f, user, ws).await.is_empty());
    }

    #[test]
    fn test_summary_caps_items_per_type() {
        let now = Utc::now();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let items: Vec<_> = (0..4)
            .map(|i| {
                Notification::from_new(
                    NewNotification::new(user, ws, NotificationType::FileShared, format!("file {i}"), "x", user),
                    now,
                )
            })
            .collect();
        let summary = DigestSummary::build(&items, 2);
        assert_eq!(summary.groups[0].count, 4);
        assert_eq!(summary.groups[0].items.len(), 2);
        assert_eq!(summary.content(), "Shared files (4)");
        assert_eq!(summary.title(DigestFrequency::Weekly), "Your weekly digest: 4 unread notifications");
    }
}
