//! External channel provider configuration.

use serde::{Deserialize, Serialize};

/// Provider settings for each external delivery channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Email provider.
    #[serde(default)]
    pub email: ChannelProviderConfig,
    /// SMS provider.
    #[serde(default)]
    pub sms: ChannelProviderConfig,
    /// Push provider.
    #[serde(default)]
    pub push: ChannelProviderConfig,
}

/// Settings for one external channel provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProviderConfig {
    /// `"log"`, `"webhook"`, or `"disabled"`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Target URL when `kind = "webhook"`.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for ChannelProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            webhook_url: None,
        }
    }
}

fn default_kind() -> String {
    "log".to_string()
}
