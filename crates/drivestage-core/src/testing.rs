//! In-memory port implementations for tests
//!
//! Available to this crate's unit tests and, through the `testing` feature,
//! to dependent crates' test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use crate::domain::{FileId, FileNotice, FileRecord, FolderId};
use crate::ports::{IFileProcessor, INotificationRelay, IStorageProvider, WatchChannel, WatchRequest};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// InMemoryStorage
// ============================================================================

/// Storage operations that can be made to fail with [`InMemoryStorage::fail_on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    GetFile,
    ListFolder,
    UpdateParents,
    Download,
    Create,
    Watch,
    StopWatch,
}

/// A storage service held entirely in memory
#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<HashMap<FileId, FileRecord>>,
    contents: Mutex<HashMap<FileId, Vec<u8>>>,
    failing: Mutex<HashSet<StorageOp>>,
    parent_updates: AtomicUsize,
    created: Mutex<Vec<FileId>>,
    channels: Mutex<Vec<WatchChannel>>,
    stopped: Mutex<Vec<String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given parents
    pub fn insert(&self, id: &str, name: &str, parents: &[&str]) -> FileRecord {
        let record = FileRecord::new(
            file_id(id),
            name,
            parents.iter().map(|p| folder_id(p)).collect(),
        );
        self.insert_record(record.clone());
        record
    }

    pub fn insert_record(&self, record: FileRecord) {
        lock(&self.files).insert(record.id().clone(), record);
    }

    pub fn set_content(&self, id: &str, data: &[u8]) {
        lock(&self.contents).insert(file_id(id), data.to_vec());
    }

    /// Makes every subsequent call of `op` fail
    pub fn fail_on(&self, op: StorageOp) {
        lock(&self.failing).insert(op);
    }

    /// Current parents of a file, as plain strings
    pub fn parents_of(&self, id: &str) -> Vec<String> {
        lock(&self.files)
            .get(&file_id(id))
            .map(|r| r.parents().iter().map(|p| p.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<FileRecord> {
        lock(&self.files).get(&file_id(id)).cloned()
    }

    pub fn content_of(&self, id: &str) -> Option<Vec<u8>> {
        lock(&self.contents).get(&file_id(id)).cloned()
    }

    /// Number of parent updates that reached the store
    pub fn parent_update_count(&self) -> usize {
        self.parent_updates.load(Ordering::SeqCst)
    }

    /// Ids of files created through `create_file`, in order
    pub fn created(&self) -> Vec<FileId> {
        lock(&self.created).clone()
    }

    pub fn channels(&self) -> Vec<WatchChannel> {
        lock(&self.channels).clone()
    }

    /// Ids of channels that were stopped
    pub fn stopped_channels(&self) -> Vec<String> {
        lock(&self.stopped).clone()
    }

    fn check(&self, op: StorageOp) -> anyhow::Result<()> {
        if lock(&self.failing).contains(&op) {
            bail!("injected {op:?} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl IStorageProvider for InMemoryStorage {
    async fn get_file(&self, file_id: &FileId) -> anyhow::Result<FileRecord> {
        self.check(StorageOp::GetFile)?;
        lock(&self.files)
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {file_id}"))
    }

    async fn list_folder(&self, folder_id: &FolderId) -> anyhow::Result<Vec<FileRecord>> {
        self.check(StorageOp::ListFolder)?;
        let mut records: Vec<FileRecord> = lock(&self.files)
            .values()
            .filter(|r| r.is_in(folder_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(records)
    }

    async fn update_parents(
        &self,
        file_id: &FileId,
        remove: &FolderId,
        add: &FolderId,
    ) -> anyhow::Result<FileRecord> {
        self.check(StorageOp::UpdateParents)?;
        let mut files = lock(&self.files);
        let record = files
            .get(file_id)
            .ok_or_else(|| anyhow!("File not found: {file_id}"))?;

        let mut parents: Vec<FolderId> = record
            .parents()
            .iter()
            .filter(|p| *p != remove)
            .cloned()
            .collect();
        if !parents.contains(add) {
            parents.push(add.clone());
        }
        let updated = FileRecord::new(file_id.clone(), record.name(), parents)
            .with_times(record.created_time(), record.modified_time());
        files.insert(file_id.clone(), updated.clone());
        self.parent_updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn download_file(&self, file_id: &FileId) -> anyhow::Result<Vec<u8>> {
        self.check(StorageOp::Download)?;
        if !lock(&self.files).contains_key(file_id) {
            bail!("File not found: {file_id}");
        }
        Ok(lock(&self.contents).get(file_id).cloned().unwrap_or_default())
    }

    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        mime_type: Option<&str>,
        data: &[u8],
    ) -> anyhow::Result<FileRecord> {
        self.check(StorageOp::Create)?;
        let n = lock(&self.created).len() + 1;
        let id = file_id(&format!("created-{n}"));
        let mut record = FileRecord::new(id.clone(), name, vec![parent.clone()]);
        if let Some(mime) = mime_type {
            record = record.with_mime_type(mime);
        }
        lock(&self.files).insert(id.clone(), record.clone());
        lock(&self.contents).insert(id.clone(), data.to_vec());
        lock(&self.created).push(id);
        Ok(record)
    }

    async fn watch_folder(
        &self,
        folder_id: &FolderId,
        request: &WatchRequest,
    ) -> anyhow::Result<WatchChannel> {
        self.check(StorageOp::Watch)?;
        let channel = WatchChannel {
            id: request.channel_id.clone(),
            resource_id: format!("res-{folder_id}"),
            resource_uri: None,
            expiration: request.expiration,
        };
        lock(&self.channels).push(channel.clone());
        Ok(channel)
    }

    async fn stop_watch(&self, channel: &WatchChannel) -> anyhow::Result<()> {
        self.check(StorageOp::StopWatch)?;
        lock(&self.stopped).push(channel.id.clone());
        Ok(())
    }
}

// ============================================================================
// RecordingRelay
// ============================================================================

/// Relay that records every notice it is given
#[derive(Default)]
pub struct RecordingRelay {
    notices: Mutex<Vec<FileNotice>>,
    failing: AtomicBool,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A relay whose every delivery fails
    pub fn failing() -> Self {
        let relay = Self::default();
        relay.failing.store(true, Ordering::SeqCst);
        relay
    }

    pub fn notices(&self) -> Vec<FileNotice> {
        lock(&self.notices).clone()
    }
}

#[async_trait]
impl INotificationRelay for RecordingRelay {
    async fn relay(&self, notice: &FileNotice) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("injected relay failure");
        }
        lock(&self.notices).push(notice.clone());
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Processors
// ============================================================================

/// Processor that succeeds immediately and records what it saw
#[derive(Default)]
pub struct RecordingProcessor {
    seen: Mutex<Vec<FileId>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<FileId> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl IFileProcessor for RecordingProcessor {
    async fn process(&self, file: &FileRecord) -> anyhow::Result<()> {
        lock(&self.seen).push(file.id().clone());
        Ok(())
    }
}

/// Processor that always fails
pub struct FailingProcessor;

#[async_trait]
impl IFileProcessor for FailingProcessor {
    async fn process(&self, file: &FileRecord) -> anyhow::Result<()> {
        bail!("processing failed for {}", file.id())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a [`FileId`] from a known-valid literal
pub fn file_id(id: &str) -> FileId {
    FileId::new(id.to_string()).unwrap_or_else(|e| panic!("bad test file id {id:?}: {e}"))
}

/// Builds a [`FolderId`] from a known-valid literal
pub fn folder_id(id: &str) -> FolderId {
    FolderId::new(id.to_string()).unwrap_or_else(|e| panic!("bad test folder id {id:?}: {e}"))
}
