//! Pub/Sub publish relay
//!
//! Publishes each notice as one message whose data is the base64 of the
//! JSON wire notice `{"fileName": .., "resourceId": ..}`.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use drivestage_core::domain::FileNotice;
use drivestage_core::ports::INotificationRelay;

use crate::auth::TokenSource;
use crate::check_status;

/// Base URL of the Pub/Sub REST API
const PUBSUB_BASE_URL: &str = "https://pubsub.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Relay that publishes notices to a Pub/Sub topic
pub struct PubSubRelay {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    topic_path: String,
}

impl PubSubRelay {
    /// # Arguments
    ///
    /// * `tokens` - Credentials for the publish call
    /// * `topic_path` - Full topic path, `projects/<project>/topics/<topic>`
    pub fn new(tokens: Arc<dyn TokenSource>, topic_path: impl Into<String>) -> Self {
        Self::with_base_url(tokens, topic_path, PUBSUB_BASE_URL)
    }

    /// Uses a custom API address (useful for testing and emulators)
    pub fn with_base_url(
        tokens: Arc<dyn TokenSource>,
        topic_path: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            topic_path: topic_path.into(),
        }
    }

    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }

    /// Encodes a notice as a publish request body
    pub fn publish_body(notice: &FileNotice) -> Result<serde_json::Value> {
        let payload =
            serde_json::to_vec(&notice.to_wire()).context("Failed to serialize notice")?;
        Ok(json!({ "messages": [ { "data": STANDARD.encode(payload) } ] }))
    }
}

#[async_trait]
impl INotificationRelay for PubSubRelay {
    async fn relay(&self, notice: &FileNotice) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/v1/{}:publish", self.base_url, self.topic_path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&Self::publish_body(notice)?)
            .send()
            .await
            .with_context(|| format!("Failed to publish to {}", self.topic_path))?;

        let published: PublishResponse = check_status(response)
            .await
            .with_context(|| format!("Publish to {} returned error status", self.topic_path))?
            .json()
            .await
            .context("Failed to parse publish response")?;

        debug!(
            topic = %self.topic_path,
            message_ids = ?published.message_ids,
            "Notice published"
        );
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "pubsub"
    }
}
