//! FileRecord entity and folder roles
//!
//! A [`FileRecord`] is a read-only snapshot of a file's metadata as
//! reported by the storage service. The system never caches it between
//! steps; every step of the pipeline re-queries the live record.
//!
//! ## Parent semantics
//!
//! `parents` is kept in the order returned by the service. Only the first
//! entry is treated as the file's current location; files with more than
//! one parent are rejected by the move operation instead of having an
//! arbitrary parent rewritten.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::newtypes::{FileId, FolderId};

// ============================================================================
// FileRecord
// ============================================================================

/// Metadata snapshot of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    id: FileId,
    name: String,
    parents: Vec<FolderId>,
    mime_type: Option<String>,
    created_time: Option<DateTime<Utc>>,
    modified_time: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Creates a FileRecord with the given identity and parent list
    pub fn new(id: FileId, name: impl Into<String>, parents: Vec<FolderId>) -> Self {
        Self {
            id,
            name: name.into(),
            parents,
            mime_type: None,
            created_time: None,
            modified_time: None,
        }
    }

    /// Sets the MIME type reported by the service
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Sets the creation and modification timestamps
    pub fn with_times(
        mut self,
        created_time: Option<DateTime<Utc>>,
        modified_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_time = created_time;
        self.modified_time = modified_time;
        self
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All parent folders, in service order
    pub fn parents(&self) -> &[FolderId] {
        &self.parents
    }

    /// The folder treated as the file's current location (`parents[0]`)
    pub fn current_parent(&self) -> Option<&FolderId> {
        self.parents.first()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_time
    }

    pub fn modified_time(&self) -> Option<DateTime<Utc>> {
        self.modified_time
    }

    /// Returns true if `folder` appears anywhere in the parent list
    pub fn is_in(&self, folder: &FolderId) -> bool {
        self.parents.iter().any(|p| p == folder)
    }

    /// Returns true if the file has more than one parent folder
    pub fn has_multiple_parents(&self) -> bool {
        self.parents.len() > 1
    }

    /// Returns true if the creation or modification time falls within
    /// `window` before `now` (inclusive)
    ///
    /// A window reaching past the representable range counts every past
    /// timestamp as recent. Timestamps after `now` never count.
    pub fn changed_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let threshold = now.checked_sub_signed(window);
        [self.created_time, self.modified_time]
            .into_iter()
            .flatten()
            .any(|t| t <= now && threshold.map_or(true, |threshold| t >= threshold))
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parents: Vec<&str> = self.parents.iter().map(|p| p.as_str()).collect();
        write!(
            f,
            "{} ({}) parents=[{}]",
            self.name,
            self.id,
            parents.join(", ")
        )
    }
}

// ============================================================================
// FolderRole / StageFolders
// ============================================================================

/// Role a folder plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderRole {
    /// Monitored folder where new files arrive
    Input,
    /// Intermediate folder used while a file is processed
    Staging,
    /// Final destination after successful processing
    Output,
}

impl FolderRole {
    pub fn name(&self) -> &'static str {
        match self {
            FolderRole::Input => "input",
            FolderRole::Staging => "staging",
            FolderRole::Output => "output",
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three configured pipeline folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFolders {
    pub input: FolderId,
    pub staging: FolderId,
    pub output: FolderId,
}

impl StageFolders {
    pub fn new(input: FolderId, staging: FolderId, output: FolderId) -> Self {
        Self {
            input,
            staging,
            output,
        }
    }

    /// Returns the folder configured for `role`
    pub fn folder(&self, role: FolderRole) -> &FolderId {
        match role {
            FolderRole::Input => &self.input,
            FolderRole::Staging => &self.staging,
            FolderRole::Output => &self.output,
        }
    }

    /// Returns pairs of roles that were configured with the same folder.
    ///
    /// Overlap is not an error; callers may log it.
    pub fn overlapping_roles(&self) -> Vec<(FolderRole, FolderRole)> {
        let roles = [FolderRole::Input, FolderRole::Staging, FolderRole::Output];
        let mut overlaps = Vec::new();
        for (i, a) in roles.iter().enumerate() {
            for b in &roles[i + 1..] {
                if self.folder(*a) == self.folder(*b) {
                    overlaps.push((*a, *b));
                }
            }
        }
        overlaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str) -> FolderId {
        FolderId::new(id.to_string()).unwrap()
    }

    fn file(id: &str, parents: &[&str]) -> FileRecord {
        FileRecord::new(
            FileId::new(id.to_string()).unwrap(),
            format!("{id}.txt"),
            parents.iter().map(|p| folder(p)).collect(),
        )
    }

    #[test]
    fn test_current_parent_is_first() {
        let record = file("F1", &["A", "B"]);
        assert_eq!(record.current_parent(), Some(&folder("A")));
        assert!(record.has_multiple_parents());
    }

    #[test]
    fn test_no_parents() {
        let record = file("F1", &[]);
        assert!(record.current_parent().is_none());
        assert!(!record.has_multiple_parents());
        assert!(!record.is_in(&folder("I")));
    }

    #[test]
    fn test_is_in_checks_every_parent() {
        let record = file("F1", &["X", "I"]);
        assert!(record.is_in(&folder("I")));
        assert!(!record.is_in(&folder("O")));
    }

    #[test]
    fn test_changed_within_created() {
        let now: DateTime<Utc> = "2026-03-01T12:00:10Z".parse().unwrap();
        let record = file("F1", &["I"])
            .with_times(Some("2026-03-01T12:00:07Z".parse().unwrap()), None);
        assert!(record.changed_within(Duration::seconds(5), now));
        assert!(!record.changed_within(Duration::seconds(2), now));
    }

    #[test]
    fn test_changed_within_modified_only() {
        let now: DateTime<Utc> = "2026-03-01T12:00:10Z".parse().unwrap();
        let record = file("F1", &["I"]).with_times(
            Some("2026-02-01T00:00:00Z".parse().unwrap()),
            Some("2026-03-01T12:00:06Z".parse().unwrap()),
        );
        assert!(record.changed_within(Duration::seconds(5), now));
    }

    #[test]
    fn test_changed_within_is_inclusive_at_threshold() {
        let now: DateTime<Utc> = "2026-03-01T12:00:10Z".parse().unwrap();
        let record = file("F1", &["I"])
            .with_times(Some("2026-03-01T12:00:05Z".parse().unwrap()), None);
        assert!(record.changed_within(Duration::seconds(5), now));
        assert!(!record.changed_within(Duration::seconds(4), now));
    }

    #[test]
    fn test_changed_within_ignores_future_times() {
        let now: DateTime<Utc> = "2026-03-01T12:00:10Z".parse().unwrap();
        let record = file("F1", &["I"])
            .with_times(Some("2026-03-01T12:00:11Z".parse().unwrap()), None);
        assert!(!record.changed_within(Duration::seconds(5), now));
        assert!(!record.changed_within(Duration::MAX, now));
    }

    #[test]
    fn test_changed_within_huge_window_does_not_overflow() {
        let now = Utc::now();
        let record = file("F1", &["I"])
            .with_times(Some("2000-01-01T00:00:00Z".parse().unwrap()), None);
        assert!(record.changed_within(Duration::MAX, now));
        assert!(record.changed_within(Duration::seconds(20_000_000_000_000), now));
    }

    #[test]
    fn test_changed_within_without_times() {
        let now = Utc::now();
        assert!(!file("F1", &["I"]).changed_within(Duration::seconds(5), now));
    }

    #[test]
    fn test_display() {
        let record = file("F1", &["I", "J"]);
        assert_eq!(record.to_string(), "F1.txt (F1) parents=[I, J]");
    }

    #[test]
    fn test_stage_folders_lookup() {
        let folders = StageFolders::new(folder("I"), folder("S"), folder("O"));
        assert_eq!(folders.folder(FolderRole::Input).as_str(), "I");
        assert_eq!(folders.folder(FolderRole::Staging).as_str(), "S");
        assert_eq!(folders.folder(FolderRole::Output).as_str(), "O");
        assert!(folders.overlapping_roles().is_empty());
    }

    #[test]
    fn test_overlapping_roles_reported() {
        let folders = StageFolders::new(folder("I"), folder("I"), folder("O"));
        assert_eq!(
            folders.overlapping_roles(),
            vec![(FolderRole::Input, FolderRole::Staging)]
        );
    }
}
