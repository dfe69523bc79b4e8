//! Aggregate counters computed by the stats job.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of notification counters for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationStats {
    /// Total notifications stored.
    pub total: u64,
    /// Counts keyed by notification status.
    pub by_status: BTreeMap<String, u64>,
    /// Counts keyed by notification type.
    pub by_type: BTreeMap<String, u64>,
    /// Counts keyed by `"{channel}:{delivery_status}"`.
    pub by_channel_status: BTreeMap<String, u64>,
    /// When the snapshot was computed.
    pub computed_at: Option<DateTime<Utc>>,
}

impl NotificationStats {
    /// Count of channel records in `status` across all channels.
    pub fn channel_status_total(&self, status: &str) -> u64 {
        self.by_channel_status
            .iter()
            .filter(|(key, _)| key.rsplit(':').next() == Some(status))
            .map(|(_, count)| *count)
            .sum()
    }
}
