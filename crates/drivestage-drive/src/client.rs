//! Google Drive v3 HTTP client
//!
//! Wraps `reqwest::Client` with bearer authentication, base URL
//! construction and the shared-drive query flags.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivestage_drive::{auth::StaticToken, client::DriveClient, files};
//! use drivestage_core::domain::FileId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new(Arc::new(StaticToken::new("access-token")));
//! let file = files::get_file(&client, &"1AbC".parse::<FileId>()?).await?;
//! println!("{} is in {:?}", file.name, file.parents);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use crate::auth::TokenSource;

/// Base URL of the Google APIs front end
const GOOGLE_APIS_BASE_URL: &str = "https://www.googleapis.com";

/// Authenticated HTTP client for Drive API calls
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    drive_id: Option<String>,
}

impl DriveClient {
    /// Creates a client for the public Google APIs endpoint
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_base_url(tokens, GOOGLE_APIS_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(tokens: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            drive_id: None,
        }
    }

    /// Targets a shared drive; enables the all-drives request flags
    pub fn with_drive_id(mut self, drive_id: Option<String>) -> Self {
        self.drive_id = drive_id;
        self
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.drive_id.as_deref()
    }

    /// Returns true when requests carry `supportsAllDrives=true`
    pub fn supports_all_drives(&self) -> bool {
        self.drive_id.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for `path`
    ///
    /// The path is relative to the base URL (e.g. `/drive/v3/files/abc`).
    /// The shared-drive flag is added when a drive id is configured.
    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .tokens
            .access_token()
            .await
            .with_context(|| format!("Failed to obtain {} access token", self.tokens.kind()))?;

        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Drive request");

        let mut builder = self.client.request(method, &url).bearer_auth(token);
        if self.supports_all_drives() {
            builder = builder.query(&[("supportsAllDrives", "true")]);
        }
        Ok(builder)
    }
}
