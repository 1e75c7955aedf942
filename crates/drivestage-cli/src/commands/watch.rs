//! Watch command - Observe the monitored folder and relay new files
//!
//! Provides the `drivestage watch` command in two modes:
//!
//! - `push` registers a Drive change channel on the folder, serves the
//!   notification endpoint, and stops the channel on shutdown
//! - `poll` lists the folder on a fixed interval and relays recently
//!   created or modified files, serving only `/healthz` and `/metrics`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use drivestage_core::config::{Config, ServiceRole};
use drivestage_core::domain::FolderId;
use drivestage_core::ports::{INotificationRelay, WatchRequest};
use drivestage_core::usecases::{RelayChangeUseCase, ScanFolderUseCase, WatchFolderUseCase};
use drivestage_drive::provider::DriveStorageProvider;
use drivestage_server::{HttpServer, MetricsRegistry, Router, WatcherEndpoint};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};
use crate::wiring;

/// How the watcher learns about new files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// Drive change channel pushed to this process
    Push,
    /// Periodic folder listing
    Poll,
}

impl WatchMode {
    fn role(self) -> ServiceRole {
        match self {
            WatchMode::Push => ServiceRole::PushWatcher,
            WatchMode::Poll => ServiceRole::PollWatcher,
        }
    }
}

/// Watch the monitored folder
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Change detection strategy
    #[arg(long, value_enum, default_value_t = WatchMode::Push)]
    pub mode: WatchMode,

    /// Listen port (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Everything both modes share once startup succeeded
struct Watcher {
    config: Config,
    folder: FolderId,
    storage: Arc<DriveStorageProvider>,
    relay: Arc<dyn INotificationRelay + Send + Sync>,
    metrics: Arc<MetricsRegistry>,
    server: HttpServer,
}

impl WatchCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = Config::load(self.mode.role())?;
        let folder = config.monitored_folder().map_err(|e| anyhow!("{e}"))?;

        let drive = wiring::connect(&config)?;
        let metrics = Arc::new(MetricsRegistry::new()?);
        let relay = wiring::build_relay(&config, drive.tokens.clone(), metrics.clone())?;

        let addr = wiring::listen_addr(&config, self.port);
        let server = HttpServer::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        let watcher = Watcher {
            config,
            folder,
            storage: drive.storage,
            relay,
            metrics,
            server,
        };

        match self.mode {
            WatchMode::Push => watch_push(watcher, formatter.as_ref()).await,
            WatchMode::Poll => watch_poll(watcher, formatter.as_ref()).await,
        }
    }
}

// ============================================================================
// Push mode
// ============================================================================

async fn watch_push(watcher: Watcher, formatter: &dyn OutputFormatter) -> Result<()> {
    let Watcher {
        config,
        folder,
        storage,
        relay,
        metrics,
        server,
    } = watcher;

    let channel_id = config
        .watcher
        .channel_id
        .clone()
        .ok_or_else(|| anyhow!("CHANNEL_ID must be set in push mode"))?;
    let address = config
        .callback_url()
        .cloned()
        .ok_or_else(|| anyhow!("CALLBACK_URL or WEBHOOK_URL must be set in push mode"))?;

    let request = WatchRequest {
        channel_id,
        address,
        token: config.pubsub_topic_path(),
        expiration: None,
    };

    let subscriptions = WatchFolderUseCase::new(storage.clone());
    let channel = subscriptions.subscribe(&folder, &request).await?;

    formatter.success(&format!(
        "Watching folder {folder} through channel {} on {}",
        channel.id,
        server.local_addr()
    ));
    formatter.print_json(&serde_json::json!({
        "role": "watcher",
        "mode": "push",
        "folder": folder,
        "channel": channel,
        "addr": server.local_addr().to_string(),
    }));

    let endpoint = WatcherEndpoint::new(RelayChangeUseCase::new(storage, relay), metrics.clone());
    let router = Router::new(metrics).with_endpoint(Arc::new(endpoint));

    let shutdown = wiring::shutdown_token();
    let result = server.run(Arc::new(router), shutdown).await;

    subscriptions.unsubscribe(&channel).await;
    info!("Watcher shut down gracefully");
    result
}

// ============================================================================
// Poll mode
// ============================================================================

async fn watch_poll(watcher: Watcher, formatter: &dyn OutputFormatter) -> Result<()> {
    let Watcher {
        config,
        folder,
        storage,
        relay,
        metrics,
        server,
    } = watcher;

    let interval = Duration::from_secs(config.watcher.poll_interval_secs);
    let window = Duration::from_secs(config.watcher.recency_window_secs);
    let scanner = ScanFolderUseCase::new(storage, relay, folder.clone(), window);

    formatter.success(&format!(
        "Polling folder {folder} every {}s (health on {})",
        interval.as_secs(),
        server.local_addr()
    ));
    formatter.print_json(&serde_json::json!({
        "role": "watcher",
        "mode": "poll",
        "folder": folder,
        "interval_secs": interval.as_secs(),
        "recency_window_secs": window.as_secs(),
        "addr": server.local_addr().to_string(),
    }));

    let shutdown = wiring::shutdown_token();
    let health = tokio::spawn(server.run(Arc::new(Router::new(metrics)), shutdown.clone()));

    scanner.poll(interval, shutdown.cancelled()).await;

    health.await.context("Health server task panicked")??;
    info!("Watcher shut down gracefully");
    Ok(())
}
