//! Channel provider that POSTs each message as JSON to a configured URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;

use super::channel::{ChannelProvider, DeliveryFailure, OutboundMessage};

/// HTTP webhook provider.
///
/// 2xx is success. 408, 429 and 5xx are transient; any other 4xx is a
/// permanent rejection.
#[derive(Debug, Clone)]
pub struct WebhookChannelProvider {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannelProvider {
    /// Create a provider posting to `url`.
    pub fn new(url: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build webhook client", e)
            })?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ChannelProvider for WebhookChannelProvider {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFailure> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| DeliveryFailure::transient(format!("webhook request failed: {e}")))?;

        let status = response.status();
        debug!(%status, notification_id = %message.notification_id, "Webhook responded");
        classify(status)
    }
}

fn classify(status: StatusCode) -> Result<(), DeliveryFailure> {
    if status.is_success() {
        return Ok(());
    }
    let reason = format!("webhook returned {status}");
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Err(DeliveryFailure::transient(reason))
    } else {
        Err(DeliveryFailure::permanent(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify(StatusCode::ACCEPTED).is_ok());
        assert!(!classify(StatusCode::BAD_GATEWAY).unwrap_err().permanent);
        assert!(!classify(StatusCode::TOO_MANY_REQUESTS).unwrap_err().permanent);
        assert!(classify(StatusCode::GONE).unwrap_err().permanent);
        assert!(classify(StatusCode::UNPROCESSABLE_ENTITY).unwrap_err().permanent);
    }
}
