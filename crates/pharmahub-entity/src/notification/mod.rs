//! Notification domain entities.

pub mod channel;
pub mod delivery;
pub mod filter;
pub mod kind;
pub mod model;
pub mod preference;
pub mod priority;
pub mod stats;
pub mod status;

pub use channel::{Channel, DeliveryChannels};
pub use delivery::{DeliveryAttempt, DeliveryStatus, merge_delivery};
pub use filter::NotificationFilter;
pub use kind::NotificationType;
pub use model::{NewNotification, Notification};
pub use preference::{
    CategoryOptIns, ChannelToggles, DigestFrequency, DigestSettings, NotificationPreferences,
    PreferenceCategory, PreferencesUpdate, QuietHours,
};
pub use priority::NotificationPriority;
pub use stats::NotificationStats;
pub use status::NotificationStatus;
