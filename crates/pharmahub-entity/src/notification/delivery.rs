//! Per-channel delivery status embedded in a notification.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;

/// Delivery state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Waiting for a live connection, the end of quiet hours, or a first attempt.
    Pending,
    /// Handed to the transport.
    Sent,
    /// Accepted by the external provider.
    Delivered,
    /// The last attempt failed.
    Failed,
    /// The provider rejected the recipient permanently.
    Bounced,
    /// Blocked by the recipient's preferences.
    Skipped,
}

impl DeliveryStatus {
    /// Terminal channels are never attempted again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Sent | Self::Delivered | Self::Bounced | Self::Skipped
        )
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery record for one channel of one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// The channel this record tracks.
    pub channel: Channel,
    /// Current state.
    pub status: DeliveryStatus,
    /// Number of send attempts made. Never decreases.
    #[serde(default)]
    pub attempts: u32,
    /// Time of the most recent attempt.
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the channel was handed off.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    /// When the provider accepted the message.
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Earliest time the channel may be attempted again.
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Reason recorded for the most recent failure, bounce or skip.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl DeliveryAttempt {
    /// A fresh record with no attempts.
    pub fn pending(channel: Channel) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            sent_at: None,
            delivered_at: None,
            next_attempt_at: None,
            failure_reason: None,
        }
    }

    /// True only while the channel is failed and under the attempt cap.
    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.status == DeliveryStatus::Failed && self.attempts < max_attempts
    }

    /// Whether a failed or deferred channel may be attempted at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Whether the channel was deferred (quiet hours) and is still waiting.
    pub fn is_deferred(&self) -> bool {
        self.status == DeliveryStatus::Pending && self.next_attempt_at.is_some()
    }

    /// In-app hand-off to at least one live connection.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Sent;
        self.sent_at = Some(now);
        self.next_attempt_at = None;
    }

    /// The external provider accepted the message.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt_at = Some(now);
        self.status = DeliveryStatus::Delivered;
        self.sent_at = Some(now);
        self.delivered_at = Some(now);
        self.next_attempt_at = None;
        self.failure_reason = None;
    }

    /// A transient failure. `retry_after` is `None` once the cap is reached.
    pub fn record_failure(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        retry_after: Option<Duration>,
    ) {
        self.attempts += 1;
        self.last_attempt_at = Some(now);
        self.status = DeliveryStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.next_attempt_at = retry_after.map(|d| now + d);
    }

    /// A permanent rejection by the provider.
    pub fn record_bounce(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt_at = Some(now);
        self.status = DeliveryStatus::Bounced;
        self.failure_reason = Some(reason.into());
        self.next_attempt_at = None;
    }

    /// The recipient's preferences block this channel.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = DeliveryStatus::Skipped;
        self.failure_reason = Some(reason.into());
        self.next_attempt_at = None;
    }

    /// Hold the channel back until `until`.
    pub fn defer_until(&mut self, until: DateTime<Utc>) {
        self.status = DeliveryStatus::Pending;
        self.next_attempt_at = Some(until);
    }

    /// Whether this record may overwrite `stored` for the same channel.
    ///
    /// A terminal record is final and `attempts` only grows, so a copy read
    /// before either change is stale.
    pub fn supersedes(&self, stored: &DeliveryAttempt) -> bool {
        !stored.status.is_terminal() && self.attempts >= stored.attempts
    }
}

/// Fold `incoming` into `stored` one channel at a time, dropping stale records.
///
/// Returns true if anything changed.
pub fn merge_delivery(stored: &mut Vec<DeliveryAttempt>, incoming: &[DeliveryAttempt]) -> bool {
    let mut changed = false;
    for attempt in incoming {
        match stored.iter_mut().find(|d| d.channel == attempt.channel) {
            Some(current) => {
                if current != attempt && attempt.supersedes(current) {
                    *current = attempt.clone();
                    changed = true;
                }
            }
            None => {
                stored.push(attempt.clone());
                changed = true;
            }
        }
    }
    changed
}
