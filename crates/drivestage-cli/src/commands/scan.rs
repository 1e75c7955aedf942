//! Scan command - List the monitored folder once
//!
//! Provides the `drivestage scan` command: one poll-mode pass that relays
//! notices for recent files, or only reports them with `--dry-run`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use clap::Args;

use drivestage_core::config::{Config, ServiceRole};
use drivestage_core::usecases::ScanFolderUseCase;
use drivestage_server::MetricsRegistry;

use crate::output::{get_formatter, OutputFormat};
use crate::wiring;

/// Scan the monitored folder once
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Report recent files without relaying them
    #[arg(long)]
    pub dry_run: bool,
}

impl ScanCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = Config::load(ServiceRole::PollWatcher)?;
        let folder = config.monitored_folder().map_err(|e| anyhow!("{e}"))?;

        let drive = wiring::connect(&config)?;
        let metrics = Arc::new(MetricsRegistry::new()?);
        let relay = wiring::build_relay(&config, drive.tokens.clone(), metrics)?;
        let window = Duration::from_secs(config.watcher.recency_window_secs);
        let scanner = ScanFolderUseCase::new(drive.storage, relay, folder.clone(), window);

        let report = scanner.scan(Utc::now(), self.dry_run).await?;

        let recent: Vec<_> = report.recent.iter().map(|n| n.to_wire()).collect();
        formatter.print_json(&serde_json::json!({
            "folder": folder,
            "dry_run": self.dry_run,
            "report": report,
            "recent": recent,
        }));

        formatter.success(&format!(
            "Listed {} entries in {folder}, {} recent",
            report.listed,
            report.recent.len()
        ));
        for notice in &report.recent {
            formatter.info(&format!(
                "{} {}",
                notice.file_id,
                notice.file_name.as_deref().unwrap_or("")
            ));
        }

        if self.dry_run {
            formatter.info("Dry run: nothing relayed");
            return Ok(());
        }

        formatter.info(&format!("Relayed {} notices", report.relayed));
        if report.failed > 0 {
            formatter.warn(&format!("{} notices could not be relayed", report.failed));
            bail!("{} of {} relays failed", report.failed, report.recent.len());
        }
        Ok(())
    }
}
