//! Single-parent move use case
//!
//! Rewrites a file's parent relationship from its current location to a
//! target folder. The current location is re-read from the service on
//! every call; nothing is cached between pipeline steps.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{FileId, FileRecord, FolderId};
use crate::ports::IStorageProvider;

/// Errors raised by [`MoveFileUseCase`]
#[derive(Debug, Error)]
pub enum MoveError {
    /// The file has no parent folder to move it from
    #[error("File {file_id} has no parent folder")]
    NoParents { file_id: FileId },

    /// The file is linked into several folders at once
    #[error("File {file_id} has {count} parent folders; moving multi-parent files is not supported")]
    MultipleParents { file_id: FileId, count: usize },

    /// The metadata lookup failed
    #[error("Failed to fetch parents of {file_id}: {source:#}")]
    Lookup {
        file_id: FileId,
        #[source]
        source: anyhow::Error,
    },

    /// The parent update was rejected by the service
    #[error("Failed to move {file_id} from {from} to {target}: {source:#}")]
    Update {
        file_id: FileId,
        from: FolderId,
        target: FolderId,
        #[source]
        source: anyhow::Error,
    },
}

/// Result of a successful move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The parent was rewritten; carries the updated metadata
    Moved(FileRecord),
    /// The file already sat in the target folder; no call was made
    AlreadyThere(FileRecord),
}

impl MoveOutcome {
    pub fn record(&self) -> &FileRecord {
        match self {
            MoveOutcome::Moved(r) | MoveOutcome::AlreadyThere(r) => r,
        }
    }

    pub fn into_record(self) -> FileRecord {
        match self {
            MoveOutcome::Moved(r) | MoveOutcome::AlreadyThere(r) => r,
        }
    }
}

/// Use case for moving a file between folders
pub struct MoveFileUseCase {
    storage: Arc<dyn IStorageProvider + Send + Sync>,
}

impl MoveFileUseCase {
    pub fn new(storage: Arc<dyn IStorageProvider + Send + Sync>) -> Self {
        Self { storage }
    }

    /// Moves `file_id` into `target`
    ///
    /// Only files with exactly one parent are moved. The update removes
    /// that parent and adds `target` in one call.
    ///
    /// # Errors
    ///
    /// - [`MoveError::NoParents`] / [`MoveError::MultipleParents`] without
    ///   touching the file
    /// - [`MoveError::Lookup`] / [`MoveError::Update`] when the service fails
    pub async fn execute(
        &self,
        file_id: &FileId,
        target: &FolderId,
    ) -> Result<MoveOutcome, MoveError> {
        let record = self
            .storage
            .get_file(file_id)
            .await
            .map_err(|source| MoveError::Lookup {
                file_id: file_id.clone(),
                source,
            })?;

        let current = match record.parents() {
            [] => {
                return Err(MoveError::NoParents {
                    file_id: file_id.clone(),
                })
            }
            [only] => only.clone(),
            many => {
                return Err(MoveError::MultipleParents {
                    file_id: file_id.clone(),
                    count: many.len(),
                })
            }
        };

        if &current == target {
            debug!(file_id = %file_id, folder = %target, "File already in target folder");
            return Ok(MoveOutcome::AlreadyThere(record));
        }

        let updated = self
            .storage
            .update_parents(file_id, &current, target)
            .await
            .map_err(|source| MoveError::Update {
                file_id: file_id.clone(),
                from: current.clone(),
                target: target.clone(),
                source,
            })?;

        info!(file_id = %file_id, from = %current, to = %target, "File moved");
        Ok(MoveOutcome::Moved(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{file_id, folder_id, InMemoryStorage, StorageOp};

    fn setup() -> (Arc<InMemoryStorage>, MoveFileUseCase) {
        let storage = Arc::new(InMemoryStorage::new());
        let usecase = MoveFileUseCase::new(storage.clone());
        (storage, usecase)
    }

    #[tokio::test]
    async fn test_moves_single_parent_file() {
        let (storage, usecase) = setup();
        storage.insert("F1", "a.txt", &["I"]);

        let outcome = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap();

        assert!(matches!(outcome, MoveOutcome::Moved(_)));
        assert_eq!(outcome.record().parents(), &[folder_id("S")]);
        assert_eq!(storage.parents_of("F1"), vec!["S"]);
        assert_eq!(storage.parent_update_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_parents_is_error_without_mutation() {
        let (storage, usecase) = setup();
        storage.insert("F1", "a.txt", &[]);

        let err = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap_err();

        assert!(matches!(err, MoveError::NoParents { .. }));
        assert!(storage.parents_of("F1").is_empty());
        assert_eq!(storage.parent_update_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_parents_rejected() {
        let (storage, usecase) = setup();
        storage.insert("F1", "a.txt", &["I", "X"]);

        let err = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap_err();

        assert!(matches!(err, MoveError::MultipleParents { count: 2, .. }));
        assert_eq!(storage.parents_of("F1"), vec!["I", "X"]);
        assert_eq!(storage.parent_update_count(), 0);
    }

    #[tokio::test]
    async fn test_already_in_target_is_noop() {
        let (storage, usecase) = setup();
        storage.insert("F1", "a.txt", &["S"]);

        let outcome = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap();

        assert!(matches!(outcome, MoveOutcome::AlreadyThere(_)));
        assert_eq!(storage.parent_update_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_names_file() {
        let (_storage, usecase) = setup();

        let err = usecase.execute(&file_id("F9"), &folder_id("S")).await.unwrap_err();

        assert!(matches!(err, MoveError::Lookup { .. }));
        assert!(err.to_string().contains("F9"));
    }

    #[tokio::test]
    async fn test_update_failure_names_file_and_target() {
        let (storage, usecase) = setup();
        storage.insert("F1", "a.txt", &["I"]);
        storage.fail_on(StorageOp::UpdateParents);

        let err = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("F1"));
        assert!(msg.contains("to S"));
        assert_eq!(storage.parents_of("F1"), vec!["I"]);
    }
}
