//! External channel providers.
//!
//! Email, SMS and push are sent through a [`ChannelProvider`]. The
//! transport behind it is opaque to the dispatcher; only the outcome
//! (accepted, transient failure, permanent rejection) matters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use pharmahub_core::config::{ChannelProviderConfig, ChannelsConfig};
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_core::types::{NotificationId, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    Channel, Notification, NotificationPriority, NotificationType,
};

use super::webhook::WebhookChannelProvider;

/// A failed send attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct DeliveryFailure {
    /// Provider-supplied reason.
    pub reason: String,
    /// The provider rejected the message for good (bounce).
    pub permanent: bool,
}

impl DeliveryFailure {
    /// A failure worth retrying.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            permanent: false,
        }
    }

    /// A rejection that must not be retried.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            permanent: true,
        }
    }
}

/// What an external provider receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub notification_id: NotificationId,
    pub user_id: UserId,
    pub workspace_id: WorkspaceId,
    pub channel: Channel,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
}

impl OutboundMessage {
    /// The message for `notification` on `channel`.
    pub fn for_channel(notification: &Notification, channel: Channel) -> Self {
        Self {
            notification_id: notification.id,
            user_id: notification.user_id,
            workspace_id: notification.workspace_id,
            channel,
            notification_type: notification.notification_type,
            priority: notification.priority,
            title: notification.title.clone(),
            content: notification.content.clone(),
            data: notification.data.clone(),
        }
    }
}

/// Sends one message over one external channel.
#[async_trait]
pub trait ChannelProvider: Send + Sync + 'static {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Attempt delivery. `Ok` means the provider accepted the message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFailure>;
}

/// Provider that only logs. Used in development and as the default.
#[derive(Debug, Default)]
pub struct LogChannelProvider;

#[async_trait]
impl ChannelProvider for LogChannelProvider {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFailure> {
        info!(
            channel = %message.channel,
            notification_id = %message.notification_id,
            user_id = %message.user_id,
            title = %message.title,
            "Outbound notification"
        );
        Ok(())
    }
}

/// Providers by external channel. Channels without a provider are disabled.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    providers: HashMap<Channel, Arc<dyn ChannelProvider>>,
}

impl ChannelRegistry {
    /// An empty registry; every external channel is disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build providers from configuration.
    pub fn from_config(config: &ChannelsConfig) -> AppResult<Self> {
        let mut registry = Self::new();
        for (channel, provider_config) in [
            (Channel::Email, &config.email),
            (Channel::Sms, &config.sms),
            (Channel::Push, &config.push),
        ] {
            if let Some(provider) = build_provider(channel, provider_config)? {
                info!(%channel, provider = provider.name(), "Channel provider registered");
                registry.providers.insert(channel, provider);
            }
        }
        Ok(registry)
    }

    /// Register or replace the provider for `channel`.
    pub fn with_provider(mut self, channel: Channel, provider: Arc<dyn ChannelProvider>) -> Self {
        self.providers.insert(channel, provider);
        self
    }

    /// Provider for `channel`, if enabled.
    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelProvider>> {
        self.providers.get(&channel).cloned()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<_> = self.providers.keys().collect();
        channels.sort();
        f.debug_struct("ChannelRegistry")
            .field("channels", &channels)
            .finish()
    }
}

fn build_provider(
    channel: Channel,
    config: &ChannelProviderConfig,
) -> AppResult<Option<Arc<dyn ChannelProvider>>> {
    match config.kind.as_str() {
        "disabled" => Ok(None),
        "log" => Ok(Some(Arc::new(LogChannelProvider))),
        "webhook" => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                AppError::configuration(format!("channels.{channel}.webhook_url is required"))
            })?;
            Ok(Some(Arc::new(WebhookChannelProvider::new(url)?)))
        }
        other => Err(AppError::configuration(format!(
            "Unknown provider kind '{other}' for channel {channel}. Supported: log, webhook, disabled"
        ))),
    }
}
