//! Notification delivery policy configuration.

use serde::{Deserialize, Serialize};

/// Delivery, retry, retention and listing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Attempts per external channel before it is terminally failed.
    #[serde(default = "default_max_attempts")]
    pub max_delivery_attempts: u32,
    /// Backoff base for the first retry, doubled on each further attempt.
    #[serde(default = "default_retry_base")]
    pub retry_base_delay_seconds: u64,
    /// Upper bound on the retry backoff.
    #[serde(default = "default_retry_max")]
    pub retry_max_delay_seconds: u64,
    /// Timeout applied to each external channel send.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    /// Read/dismissed notifications older than this are archived.
    #[serde(default = "default_retention_days")]
    pub archive_retention_days: i64,
    /// Window in which a repeated `group_key` returns the existing notification.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_seconds: i64,
    /// Default page size for listings.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Maximum page size for listings.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Maximum ids accepted by a bulk mark-read request.
    #[serde(default = "default_bulk_limit")]
    pub bulk_read_limit: usize,
    /// Items listed per type inside a digest payload.
    #[serde(default = "default_digest_items")]
    pub digest_items_per_type: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: default_max_attempts(),
            retry_base_delay_seconds: default_retry_base(),
            retry_max_delay_seconds: default_retry_max(),
            send_timeout_seconds: default_send_timeout(),
            archive_retention_days: default_retention_days(),
            dedup_window_seconds: default_dedup_window(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            bulk_read_limit: default_bulk_limit(),
            digest_items_per_type: default_digest_items(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base() -> u64 {
    60
}

fn default_retry_max() -> u64 {
    3600
}

fn default_send_timeout() -> u64 {
    10
}

fn default_retention_days() -> i64 {
    90
}

fn default_dedup_window() -> i64 {
    300
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_bulk_limit() -> usize {
    500
}

fn default_digest_items() -> usize {
    5
}
