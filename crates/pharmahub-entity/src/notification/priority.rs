//! Notification priority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pharmahub_core::AppError;

/// Notification priority, ordered from least to most important.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "notification_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Informational.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Should be seen soon.
    High,
    /// Bypasses quiet hours.
    Urgent,
    /// Bypasses quiet hours; patient-safety relevant.
    Critical,
}

impl NotificationPriority {
    /// Whether external delivery ignores the recipient's quiet hours.
    pub fn bypasses_quiet_hours(&self) -> bool {
        *self >= Self::Urgent
    }

    /// Return the priority as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPriority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            "critical" => Ok(Self::Critical),
            _ => Err(AppError::validation(format!(
                "Invalid priority: '{s}'. Expected one of: low, normal, high, urgent, critical"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_hours_bypass() {
        assert!(!NotificationPriority::Normal.bypasses_quiet_hours());
        assert!(!NotificationPriority::High.bypasses_quiet_hours());
        assert!(NotificationPriority::Urgent.bypasses_quiet_hours());
        assert!(NotificationPriority::Critical.bypasses_quiet_hours());
    }
}
