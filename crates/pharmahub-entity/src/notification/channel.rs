//! Delivery channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pharmahub_core::AppError;

/// An independent delivery path for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Pushed over the live realtime connection.
    InApp,
    /// Sent through the email provider.
    Email,
    /// Sent through the SMS provider.
    Sms,
    /// Sent through the mobile push provider.
    Push,
}

impl Channel {
    /// Every channel, in dispatch order. In-app always goes first.
    pub const ALL: [Channel; 4] = [Self::InApp, Self::Email, Self::Sms, Self::Push];

    /// Whether delivery goes through an external provider.
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::InApp)
    }

    /// Return the channel as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" | "inApp" => Ok(Self::InApp),
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            _ => Err(AppError::validation(format!("Invalid channel: '{s}'"))),
        }
    }
}

/// Channels requested for a single notification, as independent flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryChannels {
    /// Deliver in-app.
    #[serde(default, alias = "inApp")]
    pub in_app: bool,
    /// Deliver by email.
    #[serde(default)]
    pub email: bool,
    /// Deliver by SMS.
    #[serde(default)]
    pub sms: bool,
    /// Deliver by push.
    #[serde(default)]
    pub push: bool,
}

impl DeliveryChannels {
    /// Only the in-app channel.
    pub const IN_APP: Self = Self {
        in_app: true,
        email: false,
        sms: false,
        push: false,
    };

    /// Whether the given channel was requested.
    pub fn is_requested(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app,
            Channel::Email => self.email,
            Channel::Sms => self.sms,
            Channel::Push => self.push,
        }
    }

    /// The requested channels in dispatch order.
    pub fn requested(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.is_requested(*c))
            .collect()
    }

    /// Whether no channel at all was requested.
    pub fn is_empty(&self) -> bool {
        !(self.in_app || self.email || self.sms || self.push)
    }

    /// Build a channel set from a list.
    pub fn from_channels(channels: &[Channel]) -> Self {
        Self {
            in_app: channels.contains(&Channel::InApp),
            email: channels.contains(&Channel::Email),
            sms: channels.contains(&Channel::Sms),
            push: channels.contains(&Channel::Push),
        }
    }
}

impl Default for DeliveryChannels {
    fn default() -> Self {
        Self::IN_APP
    }
}
