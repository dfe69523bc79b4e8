//! Exponential retry backoff for external channels.

use chrono::Duration;

use pharmahub_core::config::NotificationConfig;

/// Attempt cap and delay curve for failed external deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per channel, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            max_attempts: config.max_delivery_attempts.max(1),
            base_delay: Duration::seconds(config.retry_base_delay_seconds as i64),
            max_delay: Duration::seconds(config.retry_max_delay_seconds as i64),
        }
    }

    /// Delay before the next attempt after `attempts` have been made.
    ///
    /// `None` once the cap is reached; the channel then stays failed.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        let exponent = attempts.saturating_sub(1).min(20);
        let delay = self.base_delay * 2i32.pow(exponent);
        Some(delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::seconds(30),
            max_delay: Duration::seconds(100),
        }
    }

    #[test]
    fn test_delay_doubles_until_capped() {
        let p = policy();
        assert_eq!(p.next_delay(1), Some(Duration::seconds(30)));
        assert_eq!(p.next_delay(2), Some(Duration::seconds(60)));
        assert_eq!(p.next_delay(3), Some(Duration::seconds(100)));
    }

    #[test]
    fn test_no_delay_at_cap() {
        let p = policy();
        assert!(p.next_delay(4).is_some());
        assert_eq!(p.next_delay(5), None);
        assert_eq!(p.next_delay(9), None);
    }
}
