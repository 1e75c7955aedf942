//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the pipeline depends on; their implementations live
//! in adapter crates and are injected at construction time.
//!
//! ## Ports Overview
//!
//! - [`IStorageProvider`] - Remote file storage (Google Drive)
//! - [`INotificationRelay`] - Hand-off from the watcher to the mover
//! - [`IFileProcessor`] - The processing step run on a staged file

pub mod processor;
pub mod relay;
pub mod storage;

pub use processor::IFileProcessor;
pub use relay::INotificationRelay;
pub use storage::{IStorageProvider, WatchChannel, WatchRequest};
