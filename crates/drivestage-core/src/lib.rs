//! drivestage core - Domain logic for the staged folder pipeline
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileRecord`, `FileNotice`, `PipelineRun`, `StageFolders`
//! - **Use cases** - `MoveFileUseCase`, `RunPipelineUseCase`, `ScanFolderUseCase`, `RelayChangeUseCase`
//! - **Port definitions** - Traits for adapters: `IStorageProvider`, `INotificationRelay`, `IFileProcessor`
//! - **Configuration** - Environment-driven settings validated per service role
//!
//! # Architecture
//!
//! The domain module holds pure business logic with no I/O. Ports define the
//! trait interfaces that adapter crates implement, and use cases orchestrate
//! domain entities through those ports.

pub mod config;
pub mod domain;
pub mod ports;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod usecases;
