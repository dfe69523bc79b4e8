//! Closed set of notification types.
//!
//! Every type maps exhaustively to a digest label, an optional preference
//! category and a default channel set. Adding a type is a compile error
//! until all three mappings are filled in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pharmahub_core::AppError;

use super::channel::DeliveryChannels;
use super::preference::PreferenceCategory;

/// The event that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A new direct or group message.
    NewMessage,
    /// The user was mentioned in a conversation.
    Mention,
    /// The user was invited to a conversation.
    ConversationInvite,
    /// Someone reacted to the user's message.
    MessageReaction,
    /// A patient submitted a query.
    PatientQuery,
    /// A message flagged urgent by its sender.
    UrgentMessage,
    /// A patient's therapy plan changed.
    TherapyUpdate,
    /// A clinical decision-support alert.
    ClinicalAlert,
    /// A colleague requested a consultation.
    ConsultationRequest,
    /// A consultation request was accepted.
    ConsultationAccepted,
    /// A consultation was completed.
    ConsultationCompleted,
    /// A consultation was escalated.
    ConsultationEscalated,
    /// A file was shared with the user.
    FileShared,
    /// A clinical intervention was assigned to the user.
    InterventionAssigned,
    /// A platform or workspace announcement.
    SystemAnnouncement,
    /// A synthesized summary of other notifications.
    Digest,
}

impl NotificationType {
    /// Every type, in declaration order.
    pub const ALL: [NotificationType; 16] = [
        Self::NewMessage,
        Self::Mention,
        Self::ConversationInvite,
        Self::MessageReaction,
        Self::PatientQuery,
        Self::UrgentMessage,
        Self::TherapyUpdate,
        Self::ClinicalAlert,
        Self::ConsultationRequest,
        Self::ConsultationAccepted,
        Self::ConsultationCompleted,
        Self::ConsultationEscalated,
        Self::FileShared,
        Self::InterventionAssigned,
        Self::SystemAnnouncement,
        Self::Digest,
    ];

    /// Return the type as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::Mention => "mention",
            Self::ConversationInvite => "conversation_invite",
            Self::MessageReaction => "message_reaction",
            Self::PatientQuery => "patient_query",
            Self::UrgentMessage => "urgent_message",
            Self::TherapyUpdate => "therapy_update",
            Self::ClinicalAlert => "clinical_alert",
            Self::ConsultationRequest => "consultation_request",
            Self::ConsultationAccepted => "consultation_accepted",
            Self::ConsultationCompleted => "consultation_completed",
            Self::ConsultationEscalated => "consultation_escalated",
            Self::FileShared => "file_shared",
            Self::InterventionAssigned => "intervention_assigned",
            Self::SystemAnnouncement => "system_announcement",
            Self::Digest => "digest",
        }
    }

    /// Plural heading used when this type is summarized in a digest.
    pub fn digest_label(&self) -> &'static str {
        match self {
            Self::NewMessage => "New messages",
            Self::Mention => "Mentions",
            Self::ConversationInvite => "Conversation invites",
            Self::MessageReaction => "Reactions",
            Self::PatientQuery => "Patient queries",
            Self::UrgentMessage => "Urgent messages",
            Self::TherapyUpdate => "Therapy updates",
            Self::ClinicalAlert => "Clinical alerts",
            Self::ConsultationRequest => "Consultation requests",
            Self::ConsultationAccepted => "Accepted consultations",
            Self::ConsultationCompleted => "Completed consultations",
            Self::ConsultationEscalated => "Escalated consultations",
            Self::FileShared => "Shared files",
            Self::InterventionAssigned => "Assigned interventions",
            Self::SystemAnnouncement => "Announcements",
            Self::Digest => "Digests",
        }
    }

    /// The preference opt-in governing this type. `None` means only the
    /// channel toggles apply.
    pub fn preference_category(&self) -> Option<PreferenceCategory> {
        match self {
            Self::NewMessage => Some(PreferenceCategory::NewMessage),
            Self::Mention => Some(PreferenceCategory::Mentions),
            Self::ConversationInvite => Some(PreferenceCategory::ConversationInvites),
            Self::PatientQuery => Some(PreferenceCategory::PatientQueries),
            Self::UrgentMessage => Some(PreferenceCategory::UrgentMessages),
            Self::TherapyUpdate => Some(PreferenceCategory::TherapyUpdates),
            Self::ClinicalAlert | Self::InterventionAssigned => {
                Some(PreferenceCategory::ClinicalAlerts)
            }
            Self::ConsultationRequest
            | Self::ConsultationAccepted
            | Self::ConsultationCompleted
            | Self::ConsultationEscalated => Some(PreferenceCategory::ConsultationRequests),
            Self::SystemAnnouncement => Some(PreferenceCategory::SystemNotifications),
            Self::MessageReaction | Self::FileShared | Self::Digest => None,
        }
    }

    /// Channels used when the creator does not request any explicitly.
    pub fn default_channels(&self) -> DeliveryChannels {
        let (email, sms, push) = match self {
            Self::UrgentMessage | Self::ClinicalAlert => (true, true, true),
            Self::ConsultationEscalated => (true, false, true),
            Self::Mention | Self::ConsultationRequest => (false, false, true),
            Self::PatientQuery | Self::SystemAnnouncement | Self::Digest => (true, false, false),
            Self::NewMessage
            | Self::ConversationInvite
            | Self::MessageReaction
            | Self::TherapyUpdate
            | Self::ConsultationAccepted
            | Self::ConsultationCompleted
            | Self::FileShared
            | Self::InterventionAssigned => (false, false, false),
        };
        DeliveryChannels {
            in_app: true,
            email,
            sms,
            push,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown notification type: '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_defaults_to_in_app() {
        for t in NotificationType::ALL {
            assert!(t.default_channels().in_app, "{t} should default to in-app");
        }
    }

    #[test]
    fn test_string_form_matches_serde() {
        for t in NotificationType::ALL {
            let json = serde_json::to_string(&t).expect("serialize");
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<NotificationType>().expect("parse"), t);
        }
    }

    #[test]
    fn test_unknown_type_is_validation_error() {
        let err = "birthday".parse::<NotificationType>().unwrap_err();
        assert_eq!(err.kind, pharmahub_core::error::ErrorKind::Validation);
    }
}
