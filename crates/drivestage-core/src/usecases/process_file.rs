//! Simulated processing step
//!
//! Stands in for real work on a staged file: waits for a fixed delay and
//! leaves the content untouched.

use std::time::Duration;

use tracing::info;

use crate::domain::FileRecord;
use crate::ports::IFileProcessor;

/// Default processing delay
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_secs(2);

/// Processor that only sleeps
#[derive(Debug, Clone, Copy)]
pub struct SimulatedProcessor {
    delay: Duration,
}

impl SimulatedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSING_DELAY)
    }
}

#[async_trait::async_trait]
impl IFileProcessor for SimulatedProcessor {
    async fn process(&self, file: &FileRecord) -> anyhow::Result<()> {
        info!(
            file_id = %file.id(),
            name = file.name(),
            delay_ms = self.delay.as_millis() as u64,
            "Processing file"
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
