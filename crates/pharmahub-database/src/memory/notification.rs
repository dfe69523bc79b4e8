use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use pharmahub_core::result::AppResult;
use pharmahub_core::types::{NotificationId, PageRequest, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    DeliveryAttempt, DeliveryStatus, Notification, NotificationFilter, NotificationStats,
    NotificationStatus, NotificationType, merge_delivery,
};

use crate::repositories::NotificationRepository;

/// Notifications held in a concurrent map.
///
/// Conditional updates run under the entry's shard lock, so claims and
/// status transitions are atomic per notification.
#[derive(Debug, Default)]
pub struct MemoryNotificationRepository {
    rows: DashMap<NotificationId, Notification>,
}

impl MemoryNotificationRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn collect<F>(&self, mut pred: F) -> Vec<Notification>
    where
        F: FnMut(&Notification) -> bool,
    {
        self.rows
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn update_where<F>(&self, mut apply: F) -> u64
    where
        F: FnMut(&mut Notification) -> bool,
    {
        let mut changed = 0;
        for mut entry in self.rows.iter_mut() {
            if apply(entry.value_mut()) {
                changed += 1;
            }
        }
        changed
    }
}

fn is_live(n: &Notification, now: DateTime<Utc>) -> bool {
    !n.is_inert_at(now)
}

fn read(n: &mut Notification, now: DateTime<Utc>) -> bool {
    if n.status != NotificationStatus::Unread {
        return false;
    }
    n.status = NotificationStatus::Read;
    n.read_at = Some(now);
    n.updated_at = now;
    true
}

fn archive(n: &mut Notification, now: DateTime<Utc>) {
    n.status = NotificationStatus::Archived;
    n.archived_at = Some(now);
    n.updated_at = now;
}

fn newest_first(mut items: Vec<Notification>) -> Vec<Notification> {
    items.sort_by_key(|n| Reverse(n.created_at));
    items
}

fn oldest_first(mut items: Vec<Notification>, limit: i64) -> Vec<Notification> {
    items.sort_by_key(|n| n.created_at);
    items.truncate(limit.max(0) as usize);
    items
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        self.rows.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        Ok(self.rows.get(&id).map(|n| n.value().clone()))
    }

    async fn find_recent_by_group_key(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        group_key: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Option<Notification>> {
        let matches = self.collect(|n| {
            n.user_id == user_id
                && n.workspace_id == workspace_id
                && n.group_key.as_deref() == Some(group_key)
                && n.created_at >= since
        });
        Ok(newest_first(matches).into_iter().next())
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        filter: &NotificationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<Notification>, u64)> {
        let matches = newest_first(self.collect(|n| {
            n.user_id == user_id && n.workspace_id == workspace_id && filter.matches(n)
        }));
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn count_unread(&self, user_id: UserId, workspace_id: WorkspaceId) -> AppResult<u64> {
        Ok(self
            .rows
            .iter()
            .filter(|e| e.user_id == user_id && e.workspace_id == workspace_id && e.is_unread())
            .count() as u64)
    }

    async fn find_unread_between(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        Ok(newest_first(self.collect(|n| {
            n.user_id == user_id
                && n.is_unread()
                && n.notification_type != NotificationType::Digest
                && n.created_at >= from
                && n.created_at < to
        })))
    }

    async fn mark_read(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .rows
            .get_mut(&id)
            .is_some_and(|mut n| read(n.value_mut(), now)))
    }

    async fn mark_many_read(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut changed = 0;
        for id in ids {
            if let Some(mut n) = self.rows.get_mut(id)
                && n.user_id == user_id
                && read(n.value_mut(), now)
            {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn mark_all_read(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self.update_where(|n| {
            n.user_id == user_id && n.workspace_id == workspace_id && read(n, now)
        }))
    }

    async fn dismiss(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        let Some(mut entry) = self.rows.get_mut(&id) else {
            return Ok(false);
        };
        let n = entry.value_mut();
        if !n.status.can_transition_to(NotificationStatus::Dismissed) {
            return Ok(false);
        }
        n.status = NotificationStatus::Dismissed;
        n.dismissed_at = Some(now);
        n.updated_at = now;
        Ok(true)
    }

    async fn save_delivery(
        &self,
        id: NotificationId,
        delivery: &[DeliveryAttempt],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<DeliveryAttempt>> {
        let Some(mut n) = self.rows.get_mut(&id) else {
            return Ok(delivery.to_vec());
        };
        if merge_delivery(&mut n.delivery_status, delivery) {
            n.updated_at = now;
        }
        Ok(n.delivery_status.clone())
    }

    async fn claim_for_dispatch(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        let Some(mut n) = self.rows.get_mut(&id) else {
            return Ok(false);
        };
        if n.dispatched_at.is_some() {
            return Ok(false);
        }
        n.dispatched_at = Some(now);
        Ok(true)
    }

    async fn find_undispatched_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let due = self.collect(|n| n.dispatched_at.is_none() && n.is_due_at(now) && is_live(n, now));
        Ok(oldest_first(due, limit))
    }

    async fn find_due_deferrals(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let due = self.collect(|n| {
            n.dispatched_at.is_some() && is_live(n, now) && n.has_due_deferral(now)
        });
        Ok(oldest_first(due, limit))
    }

    async fn find_retryable(
        &self,
        max_attempts: u32,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let due = self.collect(|n| is_live(n, now) && n.has_retryable_channel(max_attempts, now));
        Ok(oldest_first(due, limit))
    }

    async fn archive_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.update_where(|n| {
            if n.status == NotificationStatus::Archived || !n.is_expired_at(now) {
                return false;
            }
            archive(n, now);
            true
        }))
    }

    async fn archive_older_than(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self.update_where(|n| {
            let settled = matches!(
                n.status,
                NotificationStatus::Read | NotificationStatus::Dismissed
            );
            if !settled || n.created_at >= cutoff {
                return false;
            }
            archive(n, now);
            true
        }))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let before = self.rows.len();
        self.rows
            .retain(|_, n| !(n.status == NotificationStatus::Archived && n.is_expired_at(now)));
        Ok((before - self.rows.len()) as u64)
    }

    async fn stats(&self, now: DateTime<Utc>) -> AppResult<NotificationStats> {
        let mut stats = NotificationStats {
            computed_at: Some(now),
            ..Default::default()
        };
        for entry in self.rows.iter() {
            let n = entry.value();
            stats.total += 1;
            *stats.by_status.entry(n.status.as_str().to_string()).or_default() += 1;
            *stats
                .by_type
                .entry(n.notification_type.as_str().to_string())
                .or_default() += 1;
            for d in &n.delivery_status {
                let key = format!("{}:{}", d.channel.as_str(), d.status.as_str());
                *stats.by_channel_status.entry(key).or_default() += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pharmahub_entity::notification::{Channel, NewNotification};

    fn notification(user: UserId, ws: WorkspaceId, at: DateTime<Utc>) -> Notification {
        Notification::from_new(
            NewNotification::new(
                user,
                ws,
                NotificationType::NewMessage,
                "New message",
                "Refill question from Dr. Okafor",
                UserId::new(),
            ),
            at,
        )
    }

    #[tokio::test]
    async fn test_save_delivery_never_rolls_back_a_channel() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let mut n = notification(UserId::new(), WorkspaceId::new(), now);
        n.delivery_mut(Channel::Email);
        repo.insert(&n).await.unwrap();
        let stale = n.delivery_status.clone();

        let mut in_app = n.delivery(Channel::InApp).unwrap().clone();
        in_app.mark_sent(now);
        let merged = repo
            .save_delivery(n.id, std::slice::from_ref(&in_app), now)
            .await
            .unwrap();
        assert_eq!(merged.len(), 2);

        let merged = repo.save_delivery(n.id, &stale, now).await.unwrap();
        let stored = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, merged);
        assert_eq!(stored.channel_status(Channel::InApp), Some(DeliveryStatus::Sent));
        assert_eq!(stored.channel_status(Channel::Email), Some(DeliveryStatus::Pending));
    }

    #[tokio::test]
    async fn test_claim_for_dispatch_once() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let n = notification(UserId::new(), WorkspaceId::new(), now);
        repo.insert(&n).await.unwrap();

        assert!(repo.claim_for_dispatch(n.id, now).await.unwrap());
        assert!(!repo.claim_for_dispatch(n.id, now).await.unwrap());
        assert!(repo.find_undispatched_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_pages_newest_first_and_hides_archived() {
        let repo = MemoryNotificationRepository::new();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let base = Utc::now();
        for i in 0..5 {
            repo.insert(&notification(user, ws, base + Duration::seconds(i)))
                .await
                .unwrap();
        }
        let mut archived = notification(user, ws, base + Duration::seconds(10));
        archived.status = NotificationStatus::Archived;
        repo.insert(&archived).await.unwrap();

        let page = PageRequest::new(2, 1, 100);
        let (items, total) = repo
            .find_for_user(user, ws, &NotificationFilter::default(), &page)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].created_at, base + Duration::seconds(3));
        assert_eq!(items[1].created_at, base + Duration::seconds(2));
    }

    #[tokio::test]
    async fn test_mark_many_read_ignores_other_users() {
        let repo = MemoryNotificationRepository::new();
        let ws = WorkspaceId::new();
        let (alice, bob) = (UserId::new(), UserId::new());
        let now = Utc::now();
        let mine = notification(alice, ws, now);
        let theirs = notification(bob, ws, now);
        repo.insert(&mine).await.unwrap();
        repo.insert(&theirs).await.unwrap();

        let changed = repo
            .mark_many_read(alice, &[mine.id, theirs.id], now)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(repo.count_unread(bob, ws).await.unwrap(), 1);
        assert_eq!(repo.mark_many_read(alice, &[mine.id], now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retryable_respects_cap_and_backoff() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let mut n = notification(UserId::new(), WorkspaceId::new(), now);
        n.delivery_mut(Channel::Email)
            .record_failure("smtp 451", now, Some(Duration::minutes(1)));
        repo.insert(&n).await.unwrap();

        assert!(repo.find_retryable(3, now, 10).await.unwrap().is_empty());
        let later = now + Duration::minutes(1);
        assert_eq!(repo.find_retryable(3, later, 10).await.unwrap().len(), 1);
        assert!(repo.find_retryable(1, later, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_then_delete_expired() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let mut n = notification(UserId::new(), WorkspaceId::new(), now - Duration::days(2));
        n.expires_at = Some(now - Duration::days(1));
        repo.insert(&n).await.unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 0);
        assert_eq!(repo.archive_expired(now).await.unwrap(), 1);
        assert_eq!(repo.archive_expired(now).await.unwrap(), 0);
        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_archive_older_than_skips_unread() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let (user, ws) = (UserId::new(), WorkspaceId::new());
        let old_unread = notification(user, ws, now - Duration::days(120));
        let old_read = notification(user, ws, now - Duration::days(120));
        repo.insert(&old_unread).await.unwrap();
        repo.insert(&old_read).await.unwrap();
        repo.mark_read(old_read.id, now).await.unwrap();

        let archived = repo
            .archive_older_than(now - Duration::days(90), now)
            .await
            .unwrap();
        assert_eq!(archived, 1);
        let stored = repo.find_by_id(old_unread.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Unread);
    }

    #[tokio::test]
    async fn test_stats_counts_channels() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let mut n = notification(UserId::new(), WorkspaceId::new(), now);
        n.delivery_mut(Channel::InApp).mark_sent(now);
        repo.insert(&n).await.unwrap();

        let stats = repo.stats(now).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.get("unread"), Some(&1));
        assert_eq!(stats.by_channel_status.get("in_app:sent"), Some(&1));
        assert_eq!(
            stats.channel_status_total(DeliveryStatus::Pending.as_str()),
            n.delivery_status.len() as u64 - 1
        );
    }
}
