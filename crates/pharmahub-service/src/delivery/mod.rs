//! Channel providers, quiet hours, retry backoff and the dispatcher.

pub mod backoff;
pub mod channel;
pub mod dispatcher;
pub mod publisher;
pub mod quiet_hours;
pub mod recording;
pub mod webhook;

pub use backoff::RetryPolicy;
pub use channel::{
    ChannelProvider, ChannelRegistry, DeliveryFailure, LogChannelProvider, OutboundMessage,
};
pub use dispatcher::{DeliveryDispatcher, DeliveryReport, RetryReport};
pub use publisher::{NoopPublisher, RealtimePublisher};
pub use recording::RecordingChannelProvider;
pub use webhook::WebhookChannelProvider;
