//! Seam between the dispatcher and the realtime transport.

use pharmahub_core::types::UserId;
use pharmahub_entity::notification::Notification;

/// Pushes notifications to a user's live connections.
pub trait RealtimePublisher: Send + Sync + 'static {
    /// Push `notification` to every live connection of its recipient.
    ///
    /// Returns how many connections accepted it; zero means the user is
    /// offline on this node.
    fn push_notification(&self, notification: &Notification) -> usize;

    /// Number of live connections of `user_id`.
    fn connection_count(&self, user_id: UserId) -> usize;
}

/// Publisher with no connections. Every push reaches nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl RealtimePublisher for NoopPublisher {
    fn push_notification(&self, _notification: &Notification) -> usize {
        0
    }

    fn connection_count(&self, _user_id: UserId) -> usize {
        0
    }
}
