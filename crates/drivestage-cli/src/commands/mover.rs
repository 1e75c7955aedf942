//! Mover command - Serve the staged pipeline over HTTP
//!
//! Provides the `drivestage mover` command which:
//! 1. Loads and validates the mover configuration
//! 2. Builds the Drive adapter and the simulated processor
//! 3. Serves `POST /`, `/healthz` and `/metrics` until SIGINT/SIGTERM

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::info;

use drivestage_core::config::{Config, ServiceRole};
use drivestage_core::usecases::{RunPipelineUseCase, SimulatedProcessor};
use drivestage_server::{HttpServer, MetricsRegistry, MoverEndpoint, Router};

use crate::output::{get_formatter, OutputFormat};
use crate::wiring;

/// Serve the mover endpoint
#[derive(Debug, Args)]
pub struct MoverCommand {
    /// Listen port (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

impl MoverCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = Config::load(ServiceRole::Mover)?;
        let folders = config.stage_folders().map_err(|errors| {
            let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow!("Invalid folder configuration: {}", lines.join(", "))
        })?;

        let drive = wiring::connect(&config)?;
        let processor = SimulatedProcessor::new(Duration::from_millis(
            config.pipeline.processing_delay_ms,
        ));
        let pipeline = RunPipelineUseCase::new(
            drive.storage,
            Arc::new(processor),
            folders.clone(),
            config.pipeline.output_mode,
        );

        let metrics = Arc::new(MetricsRegistry::new()?);
        let router = Router::new(metrics.clone())
            .with_endpoint(Arc::new(MoverEndpoint::new(pipeline, metrics)));

        let addr = wiring::listen_addr(&config, self.port);
        let server = HttpServer::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!(
            input = %folders.input,
            staging = %folders.staging,
            output = %folders.output,
            output_mode = %config.pipeline.output_mode,
            "Mover ready"
        );
        formatter.success(&format!("Mover listening on {}", server.local_addr()));
        formatter.print_json(&serde_json::json!({
            "role": "mover",
            "addr": server.local_addr().to_string(),
            "output_mode": config.pipeline.output_mode,
        }));

        let shutdown = wiring::shutdown_token();
        server.run(Arc::new(router), shutdown).await?;

        info!("Mover shut down gracefully");
        Ok(())
    }
}
