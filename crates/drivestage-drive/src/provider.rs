//! DriveStorageProvider - IStorageProvider implementation for Google Drive
//!
//! Delegates to the [`files`](crate::files) endpoints and converts Drive
//! resources into domain records.

use anyhow::Result;
use async_trait::async_trait;

use drivestage_core::domain::{FileId, FileRecord, FolderId};
use drivestage_core::ports::{IStorageProvider, WatchChannel, WatchRequest};

use crate::client::DriveClient;
use crate::files;

/// Storage provider backed by the Drive v3 REST API
pub struct DriveStorageProvider {
    client: DriveClient,
}

impl DriveStorageProvider {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait]
impl IStorageProvider for DriveStorageProvider {
    async fn get_file(&self, file_id: &FileId) -> Result<FileRecord> {
        files::get_file(&self.client, file_id).await?.into_record()
    }

    async fn list_folder(&self, folder_id: &FolderId) -> Result<Vec<FileRecord>> {
        files::list_children(&self.client, folder_id)
            .await?
            .into_iter()
            .map(files::DriveFile::into_record)
            .collect()
    }

    async fn update_parents(
        &self,
        file_id: &FileId,
        remove: &FolderId,
        add: &FolderId,
    ) -> Result<FileRecord> {
        files::update_parents(&self.client, file_id, remove, add)
            .await?
            .into_record()
    }

    async fn download_file(&self, file_id: &FileId) -> Result<Vec<u8>> {
        files::download(&self.client, file_id).await
    }

    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        mime_type: Option<&str>,
        data: &[u8],
    ) -> Result<FileRecord> {
        files::create_with_content(&self.client, name, parent, mime_type, data)
            .await?
            .into_record()
    }

    async fn watch_folder(
        &self,
        folder_id: &FolderId,
        request: &WatchRequest,
    ) -> Result<WatchChannel> {
        files::watch(&self.client, folder_id, request).await
    }

    async fn stop_watch(&self, channel: &WatchChannel) -> Result<()> {
        files::stop_channel(&self.client, channel).await
    }
}
