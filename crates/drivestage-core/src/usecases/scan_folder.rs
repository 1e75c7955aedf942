//! Poll-mode folder scan
//!
//! Lists the monitored folder and relays a notice for every file created
//! or modified within the recency window. Files seen in an earlier scan
//! are not remembered, so a file touched close to a scan boundary can be
//! relayed twice; the mover rejects the duplicate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{FileNotice, FolderId, NoticeSource};
use crate::ports::{INotificationRelay, IStorageProvider};

use super::relay_change::RelayChangeUseCase;

/// MIME type the storage service uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Outcome of one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Entries returned by the listing
    pub listed: usize,
    /// Notices for files inside the recency window
    #[serde(skip)]
    pub recent: Vec<FileNotice>,
    /// Notices delivered
    pub relayed: usize,
    /// Notices whose delivery failed
    pub failed: usize,
}

/// Use case for scanning a folder for recent files
pub struct ScanFolderUseCase {
    storage: Arc<dyn IStorageProvider + Send + Sync>,
    relay: RelayChangeUseCase,
    folder: FolderId,
    window: chrono::Duration,
}

impl ScanFolderUseCase {
    /// Creates the use case
    ///
    /// # Arguments
    ///
    /// * `storage` - Remote storage to list
    /// * `relay` - Where notices for recent files go
    /// * `folder` - The monitored folder
    /// * `window` - How far back a creation or modification counts as new
    pub fn new(
        storage: Arc<dyn IStorageProvider + Send + Sync>,
        relay: Arc<dyn INotificationRelay + Send + Sync>,
        folder: FolderId,
        window: Duration,
    ) -> Self {
        Self {
            relay: RelayChangeUseCase::new(storage.clone(), relay),
            storage,
            folder,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn folder(&self) -> &FolderId {
        &self.folder
    }

    /// Lists the folder once and relays notices for recent files
    ///
    /// With `dry_run` set the notices are collected but not relayed.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails. Relay failures are counted in
    /// the report instead.
    pub async fn scan(&self, now: DateTime<Utc>, dry_run: bool) -> Result<ScanReport> {
        let records = self
            .storage
            .list_folder(&self.folder)
            .await
            .with_context(|| format!("Failed to list folder {}", self.folder))?;

        let mut report = ScanReport {
            listed: records.len(),
            ..ScanReport::default()
        };

        for record in records {
            if record.mime_type() == Some(FOLDER_MIME_TYPE) {
                continue;
            }
            if !record.changed_within(self.window, now) {
                continue;
            }
            debug!(file_id = %record.id(), name = record.name(), "Recent file found");
            report.recent.push(FileNotice::new(
                record.id().clone(),
                Some(record.name().to_string()),
                NoticeSource::Poll,
            ));
        }

        if dry_run {
            return Ok(report);
        }

        for notice in &report.recent {
            match self.relay.relay_notice(notice).await {
                Ok(()) => report.relayed += 1,
                Err(e) => {
                    error!(file_id = %notice.file_id, error = ?e, "Relay failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Scans every `interval` until `shutdown` resolves
    ///
    /// A failed scan is logged and the loop carries on.
    pub async fn poll<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            folder = %self.folder,
            interval_secs = interval.as_secs(),
            "Polling for new files"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Polling stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.scan(Utc::now(), false).await {
                        Ok(report) if !report.recent.is_empty() => info!(
                            listed = report.listed,
                            relayed = report.relayed,
                            failed = report.failed,
                            "Scan complete"
                        ),
                        Ok(report) => debug!(listed = report.listed, "Scan complete"),
                        Err(e) => warn!(error = ?e, "Scan failed"),
                    }
                }
            }
        }
    }
}
