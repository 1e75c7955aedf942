//! Webhook relay
//!
//! POSTs the JSON wire notice to the mover. Any non-2xx answer is an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use drivestage_core::domain::FileNotice;
use drivestage_core::ports::INotificationRelay;

use crate::check_status;

/// Relay that POSTs notices to an HTTP endpoint
pub struct WebhookRelay {
    client: reqwest::Client,
    url: String,
}

impl WebhookRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl INotificationRelay for WebhookRelay {
    async fn relay(&self, notice: &FileNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&notice.to_wire())
            .send()
            .await
            .with_context(|| format!("Failed to POST notice to {}", self.url))?;

        let status = response.status();
        check_status(response)
            .await
            .with_context(|| format!("Webhook {} rejected notice", self.url))?;

        debug!(url = %self.url, status = status.as_u16(), "Notice delivered");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "webhook"
    }
}
