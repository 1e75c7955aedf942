//! drivestage Drive - Google Drive and Pub/Sub adapters
//!
//! Provides async clients for:
//! - Credential loading and access token minting
//! - Drive v3 file operations (metadata, listing, parent updates,
//!   download, multipart create, change channels)
//! - Notice relay by Pub/Sub publish or webhook POST
//!
//! ## Modules
//!
//! - [`auth`] - Token sources (static, service account, authorized user, metadata server)
//! - [`client`] - Authenticated Drive HTTP client
//! - [`files`] - Drive v3 file endpoints
//! - [`provider`] - `IStorageProvider` implementation
//! - [`pubsub`] - Pub/Sub publish relay
//! - [`webhook`] - Webhook POST relay

pub mod auth;
pub mod client;
pub mod files;
pub mod provider;
pub mod pubsub;
pub mod webhook;

use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Errors returned by the Google REST APIs
#[derive(Debug, Error)]
pub enum DriveError {
    /// Credentials are missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was rejected as malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriveError {
    /// Classifies a non-success status and its body
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => DriveError::Unauthorized(body),
            StatusCode::FORBIDDEN => DriveError::Forbidden(body),
            StatusCode::NOT_FOUND => DriveError::NotFound(body),
            StatusCode::BAD_REQUEST => DriveError::BadRequest(body),
            StatusCode::TOO_MANY_REQUESTS => DriveError::TooManyRequests(body),
            s if s.is_server_error() => DriveError::ServerError {
                status: s.as_u16(),
                body,
            },
            s => DriveError::UnexpectedStatus {
                status: s.as_u16(),
                body,
            },
        }
    }
}

/// Passes a success response through, turning anything else into a
/// [`DriveError`] carrying the response body
pub async fn check_status(response: Response) -> Result<Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DriveError::from_status(status, body))
}
