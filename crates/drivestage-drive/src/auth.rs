//! Credential loading and access token minting
//!
//! Every outbound Google API call carries a bearer token obtained from a
//! [`TokenSource`]. Sources are resolved once at startup, in this order:
//!
//! 1. `DRIVE_ACCESS_TOKEN` - a pre-issued token, used as is
//! 2. `GOOGLE_APPLICATION_CREDENTIALS` - a JSON credentials file, either a
//!    `service_account` key (signed JWT grant) or an `authorized_user`
//!    refresh token (OAuth2 refresh grant)
//! 3. The GCE / Cloud Run metadata server
//!
//! Minted tokens are cached until one minute before they expire.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::{basic::BasicClient, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use drivestage_core::config::CredentialsConfig;

use crate::check_status;

/// Scopes requested for minted tokens
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/pubsub",
];

/// Default OAuth2 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default metadata server address
pub const METADATA_BASE_URL: &str = "http://metadata.google.internal";

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for signed assertions, in seconds
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before their reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

// ============================================================================
// TokenSource
// ============================================================================

/// Something that can hand out a valid bearer token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a token valid for at least the next minute
    async fn access_token(&self) -> Result<String>;

    /// Short name of the credential kind, used in logs
    fn kind(&self) -> &'static str;
}

/// A minted token and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Builds a cached token from a lifetime in seconds; one hour if unknown
    pub fn expiring_in(access_token: String, expires_in_secs: Option<u64>) -> Self {
        let lifetime = expires_in_secs.map(|s| s as i64).unwrap_or(3600);
        Self {
            access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        }
    }

    /// Returns true if the token is still usable at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedToken>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }
        let token = fetch().await?;
        debug!(expires_at = %token.expires_at, "Access token minted");
        let access = token.access_token.clone();
        *slot = Some(token);
        Ok(access)
    }
}

/// Token endpoint / metadata server response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

// ============================================================================
// StaticToken
// ============================================================================

/// A fixed, pre-issued token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

// ============================================================================
// Credentials file
// ============================================================================

/// Service account key as downloaded from the cloud console
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// User credentials as written by `gcloud auth application-default login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// The supported credentials file shapes, keyed by their `type` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
}

impl CredentialsFile {
    /// Reads and parses a credentials file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse credentials file {}", path.display()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CredentialsFile::ServiceAccount(_) => "service_account",
            CredentialsFile::AuthorizedUser(_) => "authorized_user",
        }
    }

    /// Builds the token source for this file
    pub fn into_token_source(self) -> Result<Arc<dyn TokenSource>> {
        Ok(match self {
            CredentialsFile::ServiceAccount(key) => Arc::new(ServiceAccountSource::new(key)?),
            CredentialsFile::AuthorizedUser(creds) => Arc::new(AuthorizedUserSource::new(creds)?),
        })
    }
}

// ============================================================================
// ServiceAccountSource
// ============================================================================

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Mints tokens with a signed JWT bearer grant
pub struct ServiceAccountSource {
    client_email: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    token_uri: String,
    scopes: Vec<String>,
    http: reqwest::Client,
    cache: TokenCache,
}

impl ServiceAccountSource {
    /// Parses the private key up front so a bad key fails at startup
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Invalid service account private key")?;
        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            encoding_key,
            token_uri: key.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            http: reqwest::Client::new(),
            cache: TokenCache::default(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Signs the assertion sent to the token endpoint
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: self.scopes.join(" "),
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .context("Failed to sign service account assertion")
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let assertion = self.signed_assertion(Utc::now())?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Failed to reach token endpoint")?;
        let token: GoogleTokenResponse = check_status(response)
            .await
            .context("Token endpoint rejected service account assertion")?
            .json()
            .await
            .context("Failed to parse token response")?;
        Ok(CachedToken::expiring_in(token.access_token, token.expires_in))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountSource {
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    fn kind(&self) -> &'static str {
        "service_account"
    }
}

// ============================================================================
// AuthorizedUserSource
// ============================================================================

/// Mints tokens with an OAuth2 refresh grant
pub struct AuthorizedUserSource {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    cache: TokenCache,
}

impl AuthorizedUserSource {
    pub fn new(creds: AuthorizedUserCredentials) -> Result<Self> {
        let token_uri = creds.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string());
        TokenUrl::new(token_uri.clone()).context("Invalid token URL")?;
        Ok(Self {
            client_id: creds.client_id,
            client_secret: creds.client_secret,
            refresh_token: creds.refresh_token,
            token_uri,
            cache: TokenCache::default(),
        })
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(TokenUrl::new(self.token_uri.clone()).context("Invalid token URL")?);

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(self.refresh_token.clone()))
            .request_async(&http_client)
            .await
            .context("Failed to refresh user access token")?;

        Ok(CachedToken::expiring_in(
            token_result.access_token().secret().to_string(),
            token_result.expires_in().map(|d| d.as_secs()),
        ))
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserSource {
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    fn kind(&self) -> &'static str {
        "authorized_user"
    }
}

// ============================================================================
// MetadataServerSource
// ============================================================================

/// Fetches tokens for the attached service account from the metadata server
pub struct MetadataServerSource {
    base_url: String,
    http: reqwest::Client,
    cache: TokenCache,
}

impl MetadataServerSource {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_BASE_URL)
    }

    /// Uses a custom metadata address (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            cache: TokenCache::default(),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let url = format!("{}{}", self.base_url, METADATA_TOKEN_PATH);
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Failed to reach metadata server")?;
        let token: GoogleTokenResponse = check_status(response)
            .await
            .context("Metadata server refused token request")?
            .json()
            .await
            .context("Failed to parse metadata token response")?;
        Ok(CachedToken::expiring_in(token.access_token, token.expires_in))
    }
}

impl Default for MetadataServerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for MetadataServerSource {
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    fn kind(&self) -> &'static str {
        "metadata_server"
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves the token source from configuration
///
/// # Errors
///
/// Returns an error if a configured credentials file cannot be read,
/// parsed, or holds an unusable key.
pub fn token_source_from_config(config: &CredentialsConfig) -> Result<Arc<dyn TokenSource>> {
    if let Some(token) = &config.access_token {
        info!("Using pre-issued access token");
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }

    if let Some(path) = &config.credentials_file {
        let file = CredentialsFile::load(path)?;
        info!(path = %path.display(), kind = file.kind(), "Using credentials file");
        return file.into_token_source();
    }

    info!("No credentials configured; using the metadata server");
    Ok(Arc::new(MetadataServerSource::new()))
}
