//! Change relay use case
//!
//! Turns a bare file identifier observed by the watcher into a named
//! [`FileNotice`] and hands it to the notification relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::{FileId, FileNotice, NoticeSource};
use crate::ports::{INotificationRelay, IStorageProvider};

/// Use case for relaying a single observed change to the mover
pub struct RelayChangeUseCase {
    storage: Arc<dyn IStorageProvider + Send + Sync>,
    relay: Arc<dyn INotificationRelay + Send + Sync>,
}

impl RelayChangeUseCase {
    pub fn new(
        storage: Arc<dyn IStorageProvider + Send + Sync>,
        relay: Arc<dyn INotificationRelay + Send + Sync>,
    ) -> Self {
        Self { storage, relay }
    }

    /// Fetches the file's name and relays a notice for it
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata lookup or the relay fails. Nothing
    /// is retried.
    pub async fn execute(&self, file_id: &FileId, source: NoticeSource) -> Result<FileNotice> {
        let record = self
            .storage
            .get_file(file_id)
            .await
            .with_context(|| format!("Failed to fetch metadata for {file_id}"))?;

        let notice = FileNotice::new(file_id.clone(), Some(record.name().to_string()), source);
        self.relay_notice(&notice).await?;
        Ok(notice)
    }

    /// Relays an already-built notice
    pub async fn relay_notice(&self, notice: &FileNotice) -> Result<()> {
        self.relay.relay(notice).await.with_context(|| {
            format!(
                "Failed to relay notice for {} via {}",
                notice.file_id,
                self.relay.transport()
            )
        })?;
        info!(
            file_id = %notice.file_id,
            name = notice.file_name.as_deref().unwrap_or(""),
            transport = self.relay.transport(),
            source = %notice.source,
            "Notice relayed"
        );
        Ok(())
    }
}
