//! Per-channel delivery of notifications.
//!
//! The dispatcher owns `delivery_status`. It never touches the read
//! lifecycle `status`; persistence goes through
//! [`NotificationRepository::save_delivery`] only, which merges per channel
//! so concurrent passes cannot roll a channel back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use pharmahub_core::config::NotificationConfig;
use pharmahub_core::result::AppResult;
use pharmahub_database::NotificationRepository;
use pharmahub_entity::notification::{Channel, DeliveryStatus, Notification};

use super::backoff::RetryPolicy;
use super::channel::{ChannelProvider, ChannelRegistry, DeliveryFailure, OutboundMessage};
use super::publisher::RealtimePublisher;
use super::quiet_hours;
use crate::notification::preferences::PreferenceService;

const RETRY_BATCH: i64 = 200;

/// Outcome of one dispatch pass over a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Channels that reached a live connection or were accepted by a provider.
    pub delivered: Vec<Channel>,
    /// Channels blocked by preferences or with no provider.
    pub skipped: Vec<Channel>,
    /// Channels held back by quiet hours.
    pub deferred: Vec<Channel>,
    /// Channels that failed this pass.
    pub failed: Vec<Channel>,
    /// In-app left pending because the user had no live connection.
    pub in_app_pending: bool,
}

/// Summary of a retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub notifications: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Routes a notification to its requested channels.
pub struct DeliveryDispatcher {
    notifications: Arc<dyn NotificationRepository>,
    preferences: PreferenceService,
    publisher: Arc<dyn RealtimePublisher>,
    channels: ChannelRegistry,
    policy: RetryPolicy,
    send_timeout: Duration,
}

impl DeliveryDispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        preferences: PreferenceService,
        publisher: Arc<dyn RealtimePublisher>,
        channels: ChannelRegistry,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            notifications,
            preferences,
            publisher,
            channels,
            policy: RetryPolicy::from_config(config),
            send_timeout: Duration::from_secs(config.send_timeout_seconds.max(1)),
        }
    }

    /// The active retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver `notification` on every requested channel that is not terminal.
    pub async fn deliver(&self, notification: &mut Notification) -> AppResult<DeliveryReport> {
        self.deliver_at(notification, Utc::now()).await
    }

    /// [`Self::deliver`] with an explicit clock.
    ///
    /// In-app state is persisted before any external provider is called, so
    /// a slow or failing provider never holds back the in-app path.
    pub async fn deliver_at(
        &self,
        notification: &mut Notification,
        now: DateTime<Utc>,
    ) -> AppResult<DeliveryReport> {
        let mut report = DeliveryReport::default();
        if notification.is_inert_at(now) {
            debug!(id = %notification.id, "Skipping delivery of inert notification");
            return Ok(report);
        }

        let prefs = self.preferences.get_at(notification.user_id, now).await?;
        let quiet_until = quiet_hours::quiet_until(&prefs.quiet_hours, now);
        let mut external = Vec::new();

        for channel in notification.delivery_channels.requested() {
            let attempt = notification.delivery_mut(channel);
            if attempt.status.is_terminal() {
                continue;
            }
            if !prefs.allows(channel, notification.notification_type) {
                notification
                    .delivery_mut(channel)
                    .skip("disabled by recipient preferences");
                report.skipped.push(channel);
                continue;
            }

            if channel == Channel::InApp {
                if self.publisher.push_notification(notification) > 0 {
                    notification.delivery_mut(channel).mark_sent(now);
                    report.delivered.push(channel);
                } else {
                    report.in_app_pending = true;
                }
                continue;
            }

            let attempt = notification.delivery_mut(channel);
            if attempt.status == DeliveryStatus::Failed && !attempt.can_retry(self.policy.max_attempts)
            {
                continue;
            }
            if !attempt.is_due(now) {
                continue;
            }
            if let Some(until) = quiet_until
                && !notification.priority.bypasses_quiet_hours()
            {
                notification.delivery_mut(channel).defer_until(until);
                report.deferred.push(channel);
                continue;
            }
            match self.channels.get(channel) {
                Some(provider) => external.push((channel, provider)),
                None => {
                    notification
                        .delivery_mut(channel)
                        .skip("no provider configured for channel");
                    report.skipped.push(channel);
                }
            }
        }

        notification.delivery_status = self
            .notifications
            .save_delivery(notification.id, &notification.delivery_status, now)
            .await?;

        if external.is_empty() {
            return Ok(report);
        }

        let outcomes = join_all(external.into_iter().map(|(channel, provider)| {
            let message = OutboundMessage::for_channel(notification, channel);
            async move { (channel, self.send_one(provider, message).await) }
        }))
        .await;

        let id = notification.id;
        for (channel, outcome) in outcomes {
            let attempt = notification.delivery_mut(channel);
            match outcome {
                Ok(()) => {
                    attempt.record_success(now);
                    report.delivered.push(channel);
                }
                Err(failure) if failure.permanent => {
                    warn!(%id, %channel, reason = %failure, "Delivery bounced");
                    attempt.record_bounce(failure.reason, now);
                    report.failed.push(channel);
                }
                Err(failure) => {
                    let retry_after = self.policy.next_delay(attempt.attempts + 1);
                    warn!(
                        %id,
                        %channel,
                        attempt = attempt.attempts + 1,
                        will_retry = retry_after.is_some(),
                        reason = %failure,
                        "Delivery failed"
                    );
                    attempt.record_failure(failure.reason, now, retry_after);
                    report.failed.push(channel);
                }
            }
        }

        notification.delivery_status = self
            .notifications
            .save_delivery(notification.id, &notification.delivery_status, now)
            .await?;
        Ok(report)
    }

    /// Re-attempt failed external channels whose backoff has elapsed.
    pub async fn retry_failed(&self) -> AppResult<RetryReport> {
        self.retry_failed_at(Utc::now()).await
    }

    /// [`Self::retry_failed`] with an explicit clock.
    pub async fn retry_failed_at(&self, now: DateTime<Utc>) -> AppResult<RetryReport> {
        let candidates = self
            .notifications
            .find_retryable(self.policy.max_attempts, now, RETRY_BATCH)
            .await?;
        let mut summary = RetryReport {
            notifications: candidates.len(),
            ..Default::default()
        };

        for mut notification in candidates {
            match self.deliver_at(&mut notification, now).await {
                Ok(report) => {
                    summary.delivered += report.delivered.len();
                    summary.failed += report.failed.len();
                }
                Err(e) => {
                    warn!(id = %notification.id, error = %e, "Retry pass failed");
                    summary.failed += 1;
                }
            }
        }

        if summary.notifications > 0 {
            info!(
                notifications = summary.notifications,
                delivered = summary.delivered,
                failed = summary.failed,
                "Retry sweep finished"
            );
        }
        Ok(summary)
    }

    /// Mark in-app as sent for notifications just handed to a connecting client.
    pub async fn record_in_app_sync(
        &self,
        notifications: &mut [Notification],
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut updated = 0;
        for notification in notifications.iter_mut() {
            if notification.is_inert_at(now)
                || notification.channel_status(Channel::InApp) != Some(DeliveryStatus::Pending)
            {
                continue;
            }
            let in_app = notification.delivery_mut(Channel::InApp);
            in_app.mark_sent(now);
            let record = in_app.clone();
            notification.delivery_status = self
                .notifications
                .save_delivery(notification.id, std::slice::from_ref(&record), now)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn send_one(
        &self,
        provider: Arc<dyn ChannelProvider>,
        message: OutboundMessage,
    ) -> Result<(), DeliveryFailure> {
        match tokio::time::timeout(self.send_timeout, provider.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryFailure::transient(format!(
                "{} provider timed out after {}s",
                provider.name(),
                self.send_timeout.as_secs()
            ))),
        }
    }
}

impl std::fmt::Debug for DeliveryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryDispatcher")
            .field("channels", &self.channels)
            .field("policy", &self.policy)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}
