//! Notification lifecycle, preferences, digests and stats.

pub mod digest;
pub mod preferences;
pub mod stats;
pub mod store;

pub use digest::{DigestRunReport, DigestService, SYSTEM_ACTOR};
pub use preferences::PreferenceService;
pub use stats::DeliveryStatsService;
pub use store::{NotificationPage, NotificationStore, ReadReceipt, ScheduledRunReport};
