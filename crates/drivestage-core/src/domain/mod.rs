//! Domain entities and business logic
//!
//! This module contains the core domain types for drivestage:
//! - Newtypes for type-safe remote identifiers
//! - The remote file snapshot and folder roles
//! - Normalized file notices and inbound payload adapters
//! - The pipeline run state machine
//! - Domain-specific error types

pub mod errors;
pub mod file_record;
pub mod newtypes;
pub mod notification;
pub mod pipeline;

// Re-export commonly used types
pub use errors::DomainError;
pub use file_record::{FileRecord, FolderRole, StageFolders};
pub use newtypes::*;
pub use notification::{
    decode_notice, FileNotice, InboundPayload, NoticeSource, PayloadError, WireNotice,
};
pub use pipeline::{PipelineRun, PipelineStage, PipelineStep, StageTransition};
