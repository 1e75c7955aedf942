//! Run command - Push one file through the pipeline
//!
//! Provides the `drivestage run <FILE_ID>` command, the operator's way to
//! retry or test a single file without the HTTP endpoint. Uses the mover
//! configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;

use drivestage_core::config::{Config, ServiceRole};
use drivestage_core::domain::FileId;
use drivestage_core::usecases::{RunPipelineUseCase, SimulatedProcessor};

use crate::output::{get_formatter, OutputFormat};
use crate::wiring;

/// Run the pipeline for one file
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Drive file id, as found in the input folder
    pub file_id: String,

    /// Skip the simulated processing delay
    #[arg(long)]
    pub no_delay: bool,
}

impl RunCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let file_id: FileId = self.file_id.parse()?;

        let config = Config::load(ServiceRole::Mover)?;
        let folders = config
            .stage_folders()
            .map_err(|errors| anyhow!("Invalid folder configuration ({} errors)", errors.len()))?;

        let delay = if self.no_delay {
            Duration::ZERO
        } else {
            Duration::from_millis(config.pipeline.processing_delay_ms)
        };

        let drive = wiring::connect(&config)?;
        let pipeline = RunPipelineUseCase::new(
            drive.storage,
            Arc::new(SimulatedProcessor::new(delay)),
            folders,
            config.pipeline.output_mode,
        );

        match pipeline.execute(&file_id).await {
            Ok(run) => {
                formatter.success(&format!("File {file_id} delivered to the output folder"));
                if let Some(output) = run.output_file_id() {
                    formatter.info(&format!("Output file: {output}"));
                }
                formatter.info(&format!("Run: {}", run.run_id()));
                formatter.print_json(&serde_json::json!({
                    "success": true,
                    "run": run,
                }));
                Ok(())
            }
            Err(e) => {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "file_id": file_id,
                    "rejected": e.is_rejection(),
                    "step": e.step(),
                    "left_at": e.left_at(),
                    "error": e.to_string(),
                }));
                Err(e.into())
            }
        }
    }
}
