//! Notification preference entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmahub_core::types::UserId;

use super::channel::Channel;
use super::kind::NotificationType;

/// Per-user notification delivery preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// The user these preferences belong to.
    pub user_id: UserId,
    /// Per-channel master switches.
    pub channels: ChannelToggles,
    /// Per-category opt-ins.
    pub categories: CategoryOptIns,
    /// Window during which non-urgent external delivery is deferred.
    pub quiet_hours: QuietHours,
    /// Digest settings.
    pub digest: DigestSettings,
    /// When preferences were created.
    pub created_at: DateTime<Utc>,
    /// When preferences were last updated.
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    /// Default preferences, created on first access.
    pub fn default_for_user(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            channels: ChannelToggles::default(),
            categories: CategoryOptIns::default(),
            quiet_hours: QuietHours::default(),
            digest: DigestSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `channel` may carry a notification of type `kind`.
    ///
    /// The channel toggle must be on and, if the type belongs to a
    /// category, that category must be opted in.
    pub fn allows(&self, channel: Channel, kind: NotificationType) -> bool {
        if !self.channels.is_enabled(channel) {
            return false;
        }
        kind.preference_category()
            .is_none_or(|category| self.categories.is_opted_in(category))
    }

    /// Channels enabled for digests of this user.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.channels.is_enabled(*c))
            .collect()
    }

    /// Apply a partial update. Sections absent from the update keep their values.
    pub fn apply(&mut self, update: PreferencesUpdate, now: DateTime<Utc>) {
        if let Some(channels) = update.channels {
            self.channels = channels;
        }
        if let Some(categories) = update.categories {
            self.categories = categories;
        }
        if let Some(quiet_hours) = update.quiet_hours {
            self.quiet_hours = quiet_hours;
        }
        if let Some(enabled) = update.digest_enabled {
            self.digest.enabled = enabled;
        }
        if let Some(frequency) = update.digest_frequency {
            self.digest.frequency = frequency;
        }
        self.updated_at = now;
    }
}

/// Master switch per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelToggles {
    /// In-app delivery.
    #[serde(default = "default_true", alias = "inApp")]
    pub in_app: bool,
    /// Email delivery.
    #[serde(default = "default_true")]
    pub email: bool,
    /// SMS delivery.
    #[serde(default)]
    pub sms: bool,
    /// Push delivery.
    #[serde(default = "default_true")]
    pub push: bool,
}

impl ChannelToggles {
    /// Whether the channel is switched on.
    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app,
            Channel::Email => self.email,
            Channel::Sms => self.sms,
            Channel::Push => self.push,
        }
    }
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            in_app: true,
            email: true,
            sms: false,
            push: true,
        }
    }
}

/// Preference categories a user can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCategory {
    /// New messages.
    NewMessage,
    /// Mentions.
    Mentions,
    /// Conversation invites.
    ConversationInvites,
    /// Patient queries.
    PatientQueries,
    /// Urgent messages.
    UrgentMessages,
    /// Therapy updates.
    TherapyUpdates,
    /// Clinical alerts and assigned interventions.
    ClinicalAlerts,
    /// Consultation lifecycle.
    ConsultationRequests,
    /// System announcements.
    SystemNotifications,
}

/// Opt-in per category. Unknown category names are rejected on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryOptIns {
    /// New messages.
    #[serde(default = "default_true", alias = "newMessage")]
    pub new_message: bool,
    /// Mentions.
    #[serde(default = "default_true")]
    pub mentions: bool,
    /// Conversation invites.
    #[serde(default = "default_true", alias = "conversationInvites")]
    pub conversation_invites: bool,
    /// Patient queries.
    #[serde(default = "default_true", alias = "patientQueries")]
    pub patient_queries: bool,
    /// Urgent messages.
    #[serde(default = "default_true", alias = "urgentMessages")]
    pub urgent_messages: bool,
    /// Therapy updates.
    #[serde(default = "default_true", alias = "therapyUpdates")]
    pub therapy_updates: bool,
    /// Clinical alerts.
    #[serde(default = "default_true", alias = "clinicalAlerts")]
    pub clinical_alerts: bool,
    /// Consultation requests.
    #[serde(default = "default_true", alias = "consultationRequests")]
    pub consultation_requests: bool,
    /// System notifications.
    #[serde(default = "default_true", alias = "systemNotifications")]
    pub system_notifications: bool,
}

impl CategoryOptIns {
    /// Whether the category is opted in.
    pub fn is_opted_in(&self, category: PreferenceCategory) -> bool {
        match category {
            PreferenceCategory::NewMessage => self.new_message,
            PreferenceCategory::Mentions => self.mentions,
            PreferenceCategory::ConversationInvites => self.conversation_invites,
            PreferenceCategory::PatientQueries => self.patient_queries,
            PreferenceCategory::UrgentMessages => self.urgent_messages,
            PreferenceCategory::TherapyUpdates => self.therapy_updates,
            PreferenceCategory::ClinicalAlerts => self.clinical_alerts,
            PreferenceCategory::ConsultationRequests => self.consultation_requests,
            PreferenceCategory::SystemNotifications => self.system_notifications,
        }
    }
}

impl Default for CategoryOptIns {
    fn default() -> Self {
        Self {
            new_message: true,
            mentions: true,
            conversation_invites: true,
            patient_queries: true,
            urgent_messages: true,
            therapy_updates: true,
            clinical_alerts: true,
            consultation_requests: true,
            system_notifications: true,
        }
    }
}

/// Quiet-hours window in the user's local time. `start`/`end` are `HH:MM`;
/// a window whose end is before its start wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// Whether the window is active.
    #[serde(default)]
    pub enabled: bool,
    /// Local start time.
    #[serde(default = "default_quiet_start")]
    pub start: String,
    /// Local end time.
    #[serde(default = "default_quiet_end")]
    pub end: String,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_quiet_start(),
            end: default_quiet_end(),
            timezone: default_timezone(),
        }
    }
}

/// How often digests are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestFrequency {
    /// Every hour.
    Hourly,
    /// Once a day.
    #[default]
    Daily,
    /// Once a week.
    Weekly,
}

impl DigestFrequency {
    /// Length of one digest window.
    pub fn period(&self) -> chrono::Duration {
        match self {
            Self::Hourly => chrono::Duration::hours(1),
            Self::Daily => chrono::Duration::days(1),
            Self::Weekly => chrono::Duration::weeks(1),
        }
    }

    /// Return the frequency as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for DigestFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Whether digests are produced for this user.
    #[serde(default)]
    pub enabled: bool,
    /// Digest cadence.
    #[serde(default)]
    pub frequency: DigestFrequency,
    /// End of the last digest window that was sent.
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Partial preference update sent by the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferencesUpdate {
    /// Replace channel toggles.
    #[serde(default)]
    pub channels: Option<ChannelToggles>,
    /// Replace category opt-ins.
    #[serde(default)]
    pub categories: Option<CategoryOptIns>,
    /// Replace the quiet-hours window.
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// Turn digests on or off.
    #[serde(default)]
    pub digest_enabled: Option<bool>,
    /// Change the digest cadence.
    #[serde(default)]
    pub digest_frequency: Option<DigestFrequency>,
}

fn default_true() -> bool {
    true
}

fn default_quiet_start() -> String {
    "22:00".to_string()
}

fn default_quiet_end() -> String {
    "07:00".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_toggle_blocks_every_type() {
        let mut prefs = NotificationPreferences::default_for_user(UserId::new(), Utc::now());
        prefs.channels.email = false;
        for kind in NotificationType::ALL {
            assert!(!prefs.allows(Channel::Email, kind));
            assert!(prefs.allows(Channel::InApp, kind));
        }
    }

    #[test]
    fn test_category_opt_out_only_affects_its_types() {
        let mut prefs = NotificationPreferences::default_for_user(UserId::new(), Utc::now());
        prefs.categories.consultation_requests = false;
        assert!(!prefs.allows(Channel::InApp, NotificationType::ConsultationEscalated));
        assert!(prefs.allows(Channel::InApp, NotificationType::PatientQuery));
        // category-less types follow the channel toggle
        assert!(prefs.allows(Channel::InApp, NotificationType::FileShared));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let parsed = serde_json::from_str::<CategoryOptIns>(r#"{"birthdays": false}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_partial_update_keeps_other_sections() {
        let now = Utc::now();
        let mut prefs = NotificationPreferences::default_for_user(UserId::new(), now);
        let update: PreferencesUpdate =
            serde_json::from_str(r#"{"digest_enabled": true, "digest_frequency": "weekly"}"#)
                .expect("parse");
        prefs.apply(update, now);
        assert!(prefs.digest.enabled);
        assert_eq!(prefs.digest.frequency, DigestFrequency::Weekly);
        assert_eq!(prefs.channels, ChannelToggles::default());
    }
}
