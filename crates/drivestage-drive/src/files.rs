//! Drive v3 file endpoints
//!
//! Thin typed wrappers around the REST calls the pipeline needs. All
//! functions take a [`DriveClient`] and return raw Drive shapes; conversion
//! into domain records happens in [`crate::provider`].
//!
//! | Function | Endpoint |
//! |---|---|
//! | [`get_file`] | `GET /drive/v3/files/{id}` |
//! | [`list_children`] | `GET /drive/v3/files?q='{folder}' in parents and trashed = false` |
//! | [`update_parents`] | `PATCH /drive/v3/files/{id}?removeParents=..&addParents=..` |
//! | [`download`] | `GET /drive/v3/files/{id}?alt=media` |
//! | [`create_with_content`] | `POST /upload/drive/v3/files?uploadType=multipart` |
//! | [`watch`] | `POST /drive/v3/files/{id}/watch` |
//! | [`stop_channel`] | `POST /drive/v3/channels/stop` |

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use drivestage_core::domain::{FileId, FileRecord, FolderId};
use drivestage_core::ports::{WatchChannel, WatchRequest};

use crate::check_status;
use crate::client::DriveClient;

/// Fields requested for every file resource
pub const FILE_FIELDS: &str = "id,name,parents,mimeType,createdTime,modifiedTime";

/// Page size used for folder listings
const LIST_PAGE_SIZE: &str = "100";

// ============================================================================
// Drive API response types
// ============================================================================

/// Drive file resource, restricted to [`FILE_FIELDS`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    /// Converts into a domain record, validating the identifiers
    pub fn into_record(self) -> Result<FileRecord> {
        let id = FileId::new(self.id).context("Drive returned an invalid file id")?;
        let parents = self
            .parents
            .into_iter()
            .map(FolderId::new)
            .collect::<Result<Vec<_>, _>>()
            .context("Drive returned an invalid parent id")?;
        let mut record = FileRecord::new(id, self.name, parents)
            .with_times(self.created_time, self.modified_time);
        if let Some(mime) = self.mime_type {
            record = record.with_mime_type(mime);
        }
        Ok(record)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResponse {
    id: String,
    resource_id: String,
    #[serde(default)]
    resource_uri: Option<String>,
    /// Milliseconds since the epoch, as a string
    #[serde(default)]
    expiration: Option<String>,
}

fn parse_expiration(ms: Option<&str>) -> Option<DateTime<Utc>> {
    let ms: i64 = ms?.parse().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

// ============================================================================
// Endpoints
// ============================================================================

/// Fetches a file's metadata
pub async fn get_file(client: &DriveClient, id: &FileId) -> Result<DriveFile> {
    let response = client
        .request(Method::GET, &format!("/drive/v3/files/{id}"))
        .await?
        .query(&[("fields", FILE_FIELDS)])
        .send()
        .await
        .with_context(|| format!("Failed to fetch metadata for {id}"))?;

    check_status(response)
        .await
        .with_context(|| format!("GET file {id} returned error status"))?
        .json()
        .await
        .with_context(|| format!("Failed to parse metadata for {id}"))
}

/// Lists the non-trashed children of a folder, following every page
pub async fn list_children(client: &DriveClient, folder: &FolderId) -> Result<Vec<DriveFile>> {
    let query = format!("'{folder}' in parents and trashed = false");
    let fields = format!("nextPageToken,files({FILE_FIELDS})");
    let mut files = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client
            .request(Method::GET, "/drive/v3/files")
            .await?
            .query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", LIST_PAGE_SIZE),
            ]);
        if let Some(drive_id) = client.drive_id() {
            request = request.query(&[
                ("includeItemsFromAllDrives", "true"),
                ("corpora", "drive"),
                ("driveId", drive_id),
            ]);
        }
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to list folder {folder}"))?;
        let page: FileList = check_status(response)
            .await
            .with_context(|| format!("Listing folder {folder} returned error status"))?
            .json()
            .await
            .context("Failed to parse file list")?;

        debug!(folder = %folder, count = page.files.len(), "Listed page");
        files.extend(page.files);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(files)
}

/// Replaces parent `remove` with `add`
pub async fn update_parents(
    client: &DriveClient,
    id: &FileId,
    remove: &FolderId,
    add: &FolderId,
) -> Result<DriveFile> {
    let response = client
        .request(Method::PATCH, &format!("/drive/v3/files/{id}"))
        .await?
        .query(&[
            ("removeParents", remove.as_str()),
            ("addParents", add.as_str()),
            ("fields", FILE_FIELDS),
        ])
        .json(&json!({}))
        .send()
        .await
        .with_context(|| format!("Failed to move {id} from {remove} to {add}"))?;

    check_status(response)
        .await
        .with_context(|| format!("Moving {id} from {remove} to {add} returned error status"))?
        .json()
        .await
        .context("Failed to parse update response")
}

/// Downloads a file's content
pub async fn download(client: &DriveClient, id: &FileId) -> Result<Vec<u8>> {
    let response = client
        .request(Method::GET, &format!("/drive/v3/files/{id}"))
        .await?
        .query(&[("alt", "media")])
        .send()
        .await
        .with_context(|| format!("Failed to download {id}"))?;

    let bytes = check_status(response)
        .await
        .with_context(|| format!("Download of {id} returned error status"))?
        .bytes()
        .await
        .context("Failed to read download response body")?;

    debug!(file_id = %id, bytes = bytes.len(), "Downloaded file");
    Ok(bytes.to_vec())
}

/// Creates a file with content in one multipart request
pub async fn create_with_content(
    client: &DriveClient,
    name: &str,
    parent: &FolderId,
    mime_type: Option<&str>,
    data: &[u8],
) -> Result<DriveFile> {
    let mime = mime_type.unwrap_or("application/octet-stream");
    let mut metadata = json!({ "name": name, "parents": [parent.as_str()] });
    if let Some(m) = mime_type {
        metadata["mimeType"] = json!(m);
    }

    let boundary = multipart_boundary();
    let body = multipart_related_body(&boundary, &metadata, mime, data);

    let response = client
        .request(Method::POST, "/upload/drive/v3/files")
        .await?
        .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
        .header(
            reqwest::header::CONTENT_TYPE,
            format!("multipart/related; boundary={boundary}"),
        )
        .body(body)
        .send()
        .await
        .with_context(|| format!("Failed to create {name} in {parent}"))?;

    check_status(response)
        .await
        .with_context(|| format!("Creating {name} in {parent} returned error status"))?
        .json()
        .await
        .context("Failed to parse create response")
}

fn multipart_boundary() -> String {
    format!(
        "drivestage-{:x}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

/// Builds a `multipart/related` body: JSON metadata part, then content part
pub fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Registers a web-hook change channel on a folder
pub async fn watch(
    client: &DriveClient,
    folder: &FolderId,
    request: &WatchRequest,
) -> Result<WatchChannel> {
    let body = ChannelRequest {
        id: &request.channel_id,
        kind: "web_hook",
        address: &request.address,
        token: request.token.as_deref(),
        expiration: request.expiration.map(|e| e.timestamp_millis().to_string()),
    };

    let response = client
        .request(Method::POST, &format!("/drive/v3/files/{folder}/watch"))
        .await?
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to register channel on {folder}"))?;

    let channel: ChannelResponse = check_status(response)
        .await
        .with_context(|| format!("Channel registration on {folder} returned error status"))?
        .json()
        .await
        .context("Failed to parse channel response")?;

    Ok(WatchChannel {
        expiration: parse_expiration(channel.expiration.as_deref()),
        id: channel.id,
        resource_id: channel.resource_id,
        resource_uri: channel.resource_uri,
    })
}

/// Stops a change channel
pub async fn stop_channel(client: &DriveClient, channel: &WatchChannel) -> Result<()> {
    let response = client
        .request(Method::POST, "/drive/v3/channels/stop")
        .await?
        .json(&json!({ "id": channel.id, "resourceId": channel.resource_id }))
        .send()
        .await
        .with_context(|| format!("Failed to stop channel {}", channel.id))?;

    check_status(response)
        .await
        .with_context(|| format!("Stopping channel {} returned error status", channel.id))?;
    Ok(())
}
