//! Push-mode change subscription
//!
//! Registers a web-hook change channel on the monitored folder at startup
//! and stops it on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::FolderId;
use crate::ports::{IStorageProvider, WatchChannel, WatchRequest};

/// Use case for managing the folder change channel
pub struct WatchFolderUseCase {
    storage: Arc<dyn IStorageProvider + Send + Sync>,
}

impl WatchFolderUseCase {
    pub fn new(storage: Arc<dyn IStorageProvider + Send + Sync>) -> Self {
        Self { storage }
    }

    /// Registers the channel
    ///
    /// # Errors
    ///
    /// Registration failure is returned unchanged apart from context; the
    /// watcher treats it as fatal.
    pub async fn subscribe(&self, folder: &FolderId, request: &WatchRequest) -> Result<WatchChannel> {
        let channel = self
            .storage
            .watch_folder(folder, request)
            .await
            .with_context(|| format!("Failed to register change channel on folder {folder}"))?;

        info!(
            folder = %folder,
            channel_id = %channel.id,
            resource_id = %channel.resource_id,
            expiration = ?channel.expiration,
            "Change channel registered"
        );
        Ok(channel)
    }

    /// Stops the channel; failures are logged and swallowed
    pub async fn unsubscribe(&self, channel: &WatchChannel) {
        match self.storage.stop_watch(channel).await {
            Ok(()) => info!(channel_id = %channel.id, "Change channel stopped"),
            Err(e) => warn!(channel_id = %channel.id, error = ?e, "Failed to stop change channel"),
        }
    }
}
