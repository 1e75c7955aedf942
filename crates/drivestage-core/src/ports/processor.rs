//! File processor port
//!
//! The transformation applied while a file sits in the staging folder.
//! The shipped implementation only simulates work; see
//! [`SimulatedProcessor`](crate::usecases::process_file::SimulatedProcessor).

use crate::domain::FileRecord;

/// Port trait for the processing step of the pipeline
#[async_trait::async_trait]
pub trait IFileProcessor: Send + Sync {
    /// Processes a staged file. An error aborts the pipeline.
    async fn process(&self, file: &FileRecord) -> anyhow::Result<()>;
}
