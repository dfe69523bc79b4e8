//! # pharmahub-service
//!
//! Notification use cases: the store, per-channel delivery, digests,
//! delivery statistics and workspace context resolution.
//!
//! Services take their collaborators at construction time as `Arc`s.

pub mod context;
pub mod delivery;
pub mod notification;
pub mod workspace;

pub use context::RequestContext;
pub use delivery::{
    ChannelProvider, ChannelRegistry, DeliveryDispatcher, DeliveryFailure, DeliveryReport,
    LogChannelProvider, NoopPublisher, OutboundMessage, RealtimePublisher,
    RecordingChannelProvider, RetryPolicy, RetryReport, WebhookChannelProvider,
};
pub use notification::{
    DeliveryStatsService, DigestRunReport, DigestService, NotificationPage, NotificationStore,
    PreferenceService, ReadReceipt, SYSTEM_ACTOR, ScheduledRunReport,
};
pub use workspace::WorkspaceContextResolver;
