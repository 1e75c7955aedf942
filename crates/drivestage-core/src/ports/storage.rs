//! Storage provider port (driven/secondary port)
//!
//! Interface for the remote storage service that owns the files. The
//! system only reads metadata and rewrites the parent relationship, plus
//! content download/create for copy delivery.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - Implementations must not retry internally; a failed call surfaces
//!   directly to the pipeline.
//! - Updates are blind: no etag or revision precondition is sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FileId, FileRecord, FolderId};

/// Parameters for registering a change subscription on a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    /// Caller-chosen channel identifier
    pub channel_id: String,
    /// HTTPS address the service will push notifications to
    pub address: String,
    /// Opaque token echoed back with every notification
    pub token: Option<String>,
    /// Requested expiration; the service may shorten it
    pub expiration: Option<DateTime<Utc>>,
}

/// A registered change subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchChannel {
    /// Channel identifier (as requested)
    pub id: String,
    /// Service-assigned identifier of the watched resource
    pub resource_id: String,
    /// Version-specific URI of the watched resource
    pub resource_uri: Option<String>,
    /// When the service will stop delivering notifications
    pub expiration: Option<DateTime<Utc>>,
}

/// Port trait for remote storage operations
#[async_trait::async_trait]
pub trait IStorageProvider: Send + Sync {
    /// Retrieves metadata (id, name, parents, timestamps) for a file
    async fn get_file(&self, file_id: &FileId) -> anyhow::Result<FileRecord>;

    /// Lists non-trashed files whose parents include `folder_id`
    ///
    /// Implementations follow pagination and return the complete listing.
    async fn list_folder(&self, folder_id: &FolderId) -> anyhow::Result<Vec<FileRecord>>;

    /// Removes `remove` from the file's parents and adds `add`
    ///
    /// # Returns
    /// The file's metadata after the update
    async fn update_parents(
        &self,
        file_id: &FileId,
        remove: &FolderId,
        add: &FolderId,
    ) -> anyhow::Result<FileRecord>;

    /// Downloads a file's content
    async fn download_file(&self, file_id: &FileId) -> anyhow::Result<Vec<u8>>;

    /// Creates a new file with the given content under `parent`
    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        mime_type: Option<&str>,
        data: &[u8],
    ) -> anyhow::Result<FileRecord>;

    /// Registers a change subscription on a folder
    async fn watch_folder(
        &self,
        folder_id: &FolderId,
        request: &WatchRequest,
    ) -> anyhow::Result<WatchChannel>;

    /// Stops a previously registered change subscription
    async fn stop_watch(&self, channel: &WatchChannel) -> anyhow::Result<()>;
}
