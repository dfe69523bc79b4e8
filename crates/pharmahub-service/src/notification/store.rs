//! Durable notification lifecycle.
//!
//! The store owns `status` transitions (unread, read, dismissed, archived)
//! and expiry. Delivery state is delegated to the [`DeliveryDispatcher`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use pharmahub_cache::{CacheManager, keys};
use pharmahub_core::config::NotificationConfig;
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_core::traits::CacheProvider;
use pharmahub_core::types::{NotificationId, PageRequest, UserId, WorkspaceId};
use pharmahub_database::NotificationRepository;
use pharmahub_entity::notification::{
    NewNotification, Notification, NotificationFilter, NotificationStatus,
};

use crate::delivery::dispatcher::DeliveryDispatcher;

const MAX_TITLE_LEN: usize = 200;
const MAX_CONTENT_LEN: usize = 5000;
const MAX_GROUP_KEY_LEN: usize = 128;
const SWEEP_BATCH: i64 = 500;
const UNREAD_COUNT_TTL: StdDuration = StdDuration::from_secs(30);

/// One page of a user's notifications.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    /// Matches for the filter, ignoring pagination.
    pub total: u64,
    /// Unread count for the user in the workspace, ignoring the filter.
    pub unread_count: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Result of marking one notification read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadReceipt {
    pub notification_id: NotificationId,
    pub workspace_id: WorkspaceId,
    /// False when the notification was already read.
    pub changed: bool,
    pub unread_count: u64,
}

/// Summary of a scheduled-delivery sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduledRunReport {
    /// Candidates returned by the due query.
    pub due: usize,
    /// Notifications handed to the dispatcher.
    pub dispatched: usize,
    /// Lost the claim to a concurrent sweep.
    pub already_claimed: usize,
    pub failed: usize,
}

/// Notification lifecycle service.
pub struct NotificationStore {
    repo: Arc<dyn NotificationRepository>,
    dispatcher: Arc<DeliveryDispatcher>,
    cache: CacheManager,
    config: NotificationConfig,
}

impl NotificationStore {
    /// Creates a new store.
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        dispatcher: Arc<DeliveryDispatcher>,
        cache: CacheManager,
        config: NotificationConfig,
    ) -> Self {
        Self {
            repo,
            dispatcher,
            cache,
            config,
        }
    }

    /// The dispatcher notifications are handed to.
    pub fn dispatcher(&self) -> &Arc<DeliveryDispatcher> {
        &self.dispatcher
    }

    /// Page request clamped to the configured limits.
    pub fn page_request(&self, limit: Option<u64>, offset: Option<u64>) -> PageRequest {
        PageRequest::new(
            limit.unwrap_or(self.config.default_page_size),
            offset.unwrap_or(0),
            self.config.max_page_size,
        )
    }

    /// Validate, persist and (unless scheduled for later) deliver.
    pub async fn create(&self, input: NewNotification) -> AppResult<Notification> {
        self.create_at(input, Utc::now()).await
    }

    /// [`Self::create`] with an explicit clock.
    ///
    /// Delivery failures are recorded on the channels and never fail the
    /// call once the notification is stored.
    pub async fn create_at(
        &self,
        input: NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let input = validate(input, now)?;

        if let Some(group_key) = input.group_key.as_deref() {
            let since = now - Duration::seconds(self.config.dedup_window_seconds);
            if let Some(existing) = self
                .repo
                .find_recent_by_group_key(input.user_id, input.workspace_id, group_key, since)
                .await?
                && existing.is_unread()
            {
                debug!(id = %existing.id, group_key, "Collapsed duplicate notification");
                return Ok(existing);
            }
        }

        let mut notification = Notification::from_new(input, now);
        self.repo.insert(&notification).await?;
        self.forget_unread(notification.user_id, notification.workspace_id)
            .await;
        info!(
            id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.notification_type,
            scheduled = notification.scheduled_for.is_some_and(|at| at > now),
            "Notification created"
        );

        if notification.is_due_at(now) && self.repo.claim_for_dispatch(notification.id, now).await? {
            notification.dispatched_at = Some(now);
            if let Err(e) = self.dispatcher.deliver_at(&mut notification, now).await {
                warn!(id = %notification.id, error = %e, "Immediate delivery failed");
            }
        }
        Ok(notification)
    }

    /// Load one notification owned by `user_id`.
    pub async fn get(&self, id: NotificationId, user_id: UserId) -> AppResult<Notification> {
        let notification = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;
        if notification.user_id != user_id {
            return Err(AppError::authorization(
                "Notification belongs to another user",
            ));
        }
        Ok(notification)
    }

    /// Mark one notification read. Already-read notifications are a no-op.
    pub async fn mark_as_read(&self, id: NotificationId, user_id: UserId) -> AppResult<ReadReceipt> {
        self.mark_as_read_at(id, user_id, Utc::now()).await
    }

    /// [`Self::mark_as_read`] with an explicit clock.
    pub async fn mark_as_read_at(
        &self,
        id: NotificationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<ReadReceipt> {
        let notification = self.get(id, user_id).await?;
        let changed = notification.is_unread() && self.repo.mark_read(id, now).await?;
        if changed {
            self.forget_unread(user_id, notification.workspace_id).await;
        }
        let unread_count = self.unread_count(user_id, notification.workspace_id).await?;
        Ok(ReadReceipt {
            notification_id: id,
            workspace_id: notification.workspace_id,
            changed,
            unread_count,
        })
    }

    /// Mark the listed notifications read. Ids owned by others are ignored.
    pub async fn mark_many_as_read(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
    ) -> AppResult<u64> {
        if ids.len() > self.config.bulk_read_limit {
            return Err(AppError::validation(format!(
                "At most {} notifications can be marked read at once",
                self.config.bulk_read_limit
            )));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        let changed = self.repo.mark_many_read(user_id, ids, Utc::now()).await?;
        if changed > 0 {
            self.forget_all_unread(user_id).await;
        }
        Ok(changed)
    }

    /// Mark every unread notification of the user in the workspace read.
    pub async fn mark_all_as_read(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<u64> {
        let changed = self
            .repo
            .mark_all_read(user_id, workspace_id, Utc::now())
            .await?;
        self.forget_unread(user_id, workspace_id).await;
        Ok(changed)
    }

    /// Dismiss one notification. Dismissed notifications are never retried.
    pub async fn mark_as_dismissed(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> AppResult<Notification> {
        let now = Utc::now();
        let mut notification = self.get(id, user_id).await?;
        if notification.status == NotificationStatus::Archived {
            return Err(AppError::conflict("Archived notifications cannot be dismissed"));
        }
        if self.repo.dismiss(id, now).await? {
            notification.status = NotificationStatus::Dismissed;
            notification.dismissed_at = Some(now);
            notification.updated_at = now;
            self.forget_unread(user_id, notification.workspace_id).await;
        }
        Ok(notification)
    }

    /// One filtered page plus the unfiltered unread count.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        filter: &NotificationFilter,
        page: &PageRequest,
    ) -> AppResult<NotificationPage> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(AppError::validation("'from' must not be after 'to'"));
        }
        let (items, total) = self
            .repo
            .find_for_user(user_id, workspace_id, filter, page)
            .await?;
        let unread_count = self.repo.count_unread(user_id, workspace_id).await?;
        Ok(NotificationPage {
            items,
            total,
            unread_count,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Most recent unread notifications.
    pub async fn recent_unread(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        limit: u64,
    ) -> AppResult<Vec<Notification>> {
        let filter = NotificationFilter {
            status: Some(NotificationStatus::Unread),
            ..Default::default()
        };
        let page = self.page_request(Some(limit), None);
        let (items, _) = self
            .repo
            .find_for_user(user_id, workspace_id, &filter, &page)
            .await?;
        Ok(items)
    }

    /// Unread count, served from cache when fresh.
    pub async fn unread_count(&self, user_id: UserId, workspace_id: WorkspaceId) -> AppResult<u64> {
        let key = keys::unread_count(user_id, workspace_id);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => {
                if let Ok(count) = raw.parse::<u64>() {
                    return Ok(count);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unread count cache read failed"),
        }
        let count = self.repo.count_unread(user_id, workspace_id).await?;
        if let Err(e) = self
            .cache
            .set(&key, &count.to_string(), UNREAD_COUNT_TTL)
            .await
        {
            warn!(error = %e, "Unread count cache write failed");
        }
        Ok(count)
    }

    /// Recent unread notifications for a client that just connected.
    ///
    /// Pending in-app channels among them are marked sent, since the client
    /// now holds them.
    pub async fn initial_sync(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        limit: u64,
    ) -> AppResult<(Vec<Notification>, u64)> {
        let mut items = self.recent_unread(user_id, workspace_id, limit).await?;
        let synced = self
            .dispatcher
            .record_in_app_sync(&mut items, Utc::now())
            .await?;
        if synced > 0 {
            debug!(%user_id, synced, "In-app channels satisfied by initial sync");
        }
        let unread = self.repo.count_unread(user_id, workspace_id).await?;
        Ok((items, unread))
    }

    /// Notifications whose schedule has come due and which still need a delivery pass.
    ///
    /// Covers undispatched notifications past `scheduled_for` and dispatched
    /// ones whose quiet-hours deferral has ended.
    pub async fn find_scheduled_for_delivery(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let mut due = self.repo.find_undispatched_due(now, SWEEP_BATCH).await?;
        let mut seen: HashSet<NotificationId> = due.iter().map(|n| n.id).collect();
        for n in self.repo.find_due_deferrals(now, SWEEP_BATCH).await? {
            if seen.insert(n.id) {
                due.push(n);
            }
        }
        Ok(due)
    }

    /// Deliver everything due.
    pub async fn process_scheduled(&self) -> AppResult<ScheduledRunReport> {
        self.process_scheduled_at(Utc::now()).await
    }

    /// [`Self::process_scheduled`] with an explicit clock.
    ///
    /// Undispatched notifications are claimed first; a sweep that loses the
    /// claim skips the notification, so each one is dispatched once.
    pub async fn process_scheduled_at(&self, now: DateTime<Utc>) -> AppResult<ScheduledRunReport> {
        let due = self.find_scheduled_for_delivery(now).await?;
        let mut report = ScheduledRunReport {
            due: due.len(),
            ..Default::default()
        };

        for mut notification in due {
            if notification.dispatched_at.is_none() {
                if !self.repo.claim_for_dispatch(notification.id, now).await? {
                    report.already_claimed += 1;
                    continue;
                }
                notification.dispatched_at = Some(now);
            }
            match self.dispatcher.deliver_at(&mut notification, now).await {
                Ok(_) => report.dispatched += 1,
                Err(e) => {
                    warn!(id = %notification.id, error = %e, "Scheduled delivery failed");
                    report.failed += 1;
                }
            }
        }

        if report.due > 0 {
            info!(
                due = report.due,
                dispatched = report.dispatched,
                already_claimed = report.already_claimed,
                failed = report.failed,
                "Scheduled delivery sweep finished"
            );
        }
        Ok(report)
    }

    /// Archive every notification past `expires_at`.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// [`Self::sweep_expired`] with an explicit clock.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let archived = self.repo.archive_expired(now).await?;
        info!(archived, "Expired notifications archived");
        Ok(archived)
    }

    /// Archive read and dismissed notifications older than the retention window.
    pub async fn archive_old(&self) -> AppResult<u64> {
        self.archive_old_at(Utc::now()).await
    }

    /// [`Self::archive_old`] with an explicit clock.
    pub async fn archive_old_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - Duration::days(self.config.archive_retention_days);
        let archived = self.repo.archive_older_than(cutoff, now).await?;
        info!(archived, %cutoff, "Old notifications archived");
        Ok(archived)
    }

    /// Hard-delete archived notifications past `expires_at`. Admin only.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        self.delete_expired_at(Utc::now()).await
    }

    /// [`Self::delete_expired`] with an explicit clock.
    pub async fn delete_expired_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let deleted = self.repo.delete_expired(now).await?;
        info!(deleted, "Expired notifications deleted");
        Ok(deleted)
    }

    async fn forget_unread(&self, user_id: UserId, workspace_id: WorkspaceId) {
        if let Err(e) = self
            .cache
            .delete(&keys::unread_count(user_id, workspace_id))
            .await
        {
            warn!(error = %e, "Unread count cache eviction failed");
        }
    }

    async fn forget_all_unread(&self, user_id: UserId) {
        if let Err(e) = self
            .cache
            .delete_prefix(&keys::unread_count_prefix(user_id))
            .await
        {
            warn!(error = %e, "Unread count cache eviction failed");
        }
    }
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn validate(mut input: NewNotification, now: DateTime<Utc>) -> AppResult<NewNotification> {
    input.title = input.title.trim().to_string();
    input.content = input.content.trim().to_string();

    if input.title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if input.title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if input.content.is_empty() {
        return Err(AppError::validation("content is required"));
    }
    if input.content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::validation(format!(
            "content must be at most {MAX_CONTENT_LEN} characters"
        )));
    }
    if input.delivery_channels.is_some_and(|c| c.is_empty()) {
        return Err(AppError::validation(
            "at least one delivery channel must be requested",
        ));
    }
    if let Some(key) = &input.group_key {
        if key.trim().is_empty() {
            input.group_key = None;
        } else if key.len() > MAX_GROUP_KEY_LEN {
            return Err(AppError::validation(format!(
                "group_key must be at most {MAX_GROUP_KEY_LEN} bytes"
            )));
        }
    }
    if let Some(expires_at) = input.expires_at {
        if expires_at <= now {
            return Err(AppError::validation("expires_at must be in the future"));
        }
        if input.scheduled_for.is_some_and(|at| at >= expires_at) {
            return Err(AppError::validation(
                "scheduled_for must be before expires_at",
            ));
        }
    }
    if input.data.as_ref().is_some_and(|d| !d.is_object()) {
        return Err(AppError::validation("data must be a JSON object"));
    }
    Ok(input)
}
