//! Use cases (interactors) for drivestage
//!
//! Thin coordinators that delegate rules to domain methods and I/O to
//! ports.
//!
//! ## Use Cases
//!
//! - [`MoveFileUseCase`] - Single-parent folder move
//! - [`RunPipelineUseCase`] - Input → staging → process → output
//! - [`SimulatedProcessor`] - Default processing step
//! - [`RelayChangeUseCase`] - Push-mode notice relay
//! - [`ScanFolderUseCase`] - Poll-mode folder scan
//! - [`WatchFolderUseCase`] - Change channel registration

pub mod move_file;
pub mod process_file;
pub mod relay_change;
pub mod run_pipeline;
pub mod scan_folder;
pub mod watch_folder;

pub use move_file::{MoveError, MoveFileUseCase, MoveOutcome};
pub use process_file::SimulatedProcessor;
pub use relay_change::RelayChangeUseCase;
pub use run_pipeline::{PipelineError, RunPipelineUseCase};
pub use scan_folder::{ScanFolderUseCase, ScanReport};
pub use watch_folder::WatchFolderUseCase;
