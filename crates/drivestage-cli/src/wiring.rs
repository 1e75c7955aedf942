//! Adapter construction shared by the commands
//!
//! Every command builds its clients from the validated [`Config`] here and
//! injects them into the core use cases.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use drivestage_core::config::{Config, RelayMode};
use drivestage_core::ports::INotificationRelay;
use drivestage_drive::auth::{token_source_from_config, TokenSource};
use drivestage_drive::client::DriveClient;
use drivestage_drive::provider::DriveStorageProvider;
use drivestage_drive::pubsub::PubSubRelay;
use drivestage_drive::webhook::WebhookRelay;
use drivestage_server::{MeteredRelay, MetricsRegistry};

/// Authenticated Drive access for one process
pub struct DriveContext {
    pub tokens: Arc<dyn TokenSource>,
    pub storage: Arc<DriveStorageProvider>,
}

/// Resolves credentials and builds the Drive storage adapter.
///
/// # Errors
///
/// Fails when a configured credentials file cannot be loaded.
pub fn connect(config: &Config) -> Result<DriveContext> {
    let tokens = token_source_from_config(&config.credentials)
        .context("Failed to load Google credentials")?;

    let client = DriveClient::new(tokens.clone()).with_drive_id(config.folders.drive_id.clone());
    if let Some(drive_id) = client.drive_id() {
        info!(drive_id, "Shared drive support enabled");
    }

    Ok(DriveContext {
        tokens,
        storage: Arc::new(DriveStorageProvider::new(client)),
    })
}

/// Builds the watcher-to-mover relay selected by `RELAY_MODE`.
///
/// Deliveries are counted in `metrics`.
pub fn build_relay(
    config: &Config,
    tokens: Arc<dyn TokenSource>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Arc<dyn INotificationRelay + Send + Sync>> {
    let inner: Arc<dyn INotificationRelay + Send + Sync> = match config.watcher.relay_mode {
        RelayMode::Webhook => {
            let url = config
                .watcher
                .webhook_url
                .clone()
                .ok_or_else(|| anyhow!("WEBHOOK_URL must be set for the webhook relay"))?;
            info!(url = %url, "Relaying notices by webhook");
            Arc::new(WebhookRelay::new(url))
        }
        RelayMode::PubSub => {
            let topic = config
                .pubsub_topic_path()
                .ok_or_else(|| anyhow!("PUBSUB_TOPIC must be set for the pubsub relay"))?;
            info!(topic = %topic, "Relaying notices by Pub/Sub");
            Arc::new(PubSubRelay::new(tokens, topic))
        }
    };
    Ok(Arc::new(MeteredRelay::new(inner, metrics)))
}

/// Address the HTTP server listens on: all interfaces, `PORT` or `--port`
pub fn listen_addr(config: &Config, port: Option<u16>) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port.unwrap_or(config.server.port)))
}

/// Returns a token cancelled on SIGINT or SIGTERM
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });
    token
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned()).expect("config parses")
    }

    fn metrics() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new().unwrap())
    }

    #[test]
    fn test_listen_addr_prefers_flag() {
        let config = config(&[("PORT", "9000")]);
        assert_eq!(listen_addr(&config, None).port(), 9000);
        assert_eq!(listen_addr(&config, Some(7000)).port(), 7000);
        assert!(listen_addr(&config, None).ip().is_unspecified());
    }

    #[test]
    fn test_build_relay_by_mode() {
        let tokens: Arc<dyn TokenSource> =
            Arc::new(drivestage_drive::auth::StaticToken::new("t"));

        let webhook = config(&[("WEBHOOK_URL", "https://mover.example.com/")]);
        let relay = build_relay(&webhook, tokens.clone(), metrics()).unwrap();
        assert_eq!(relay.transport(), "webhook");

        let pubsub = config(&[
            ("RELAY_MODE", "pubsub"),
            ("PUBSUB_TOPIC", "new-files"),
            ("GOOGLE_CLOUD_PROJECT", "p"),
        ]);
        let relay = build_relay(&pubsub, tokens.clone(), metrics()).unwrap();
        assert_eq!(relay.transport(), "pubsub");

        let incomplete = config(&[("RELAY_MODE", "pubsub")]);
        assert!(build_relay(&incomplete, tokens, metrics()).is_err());
    }

    #[test]
    fn test_connect_with_static_token_and_shared_drive() {
        let config = config(&[("DRIVE_ACCESS_TOKEN", "t"), ("DRIVE_ID", "0ADRIVE")]);
        let ctx = connect(&config).expect("connect");
        assert_eq!(ctx.tokens.kind(), "static");
        assert_eq!(ctx.storage.client().drive_id(), Some("0ADRIVE"));
    }

    #[test]
    fn test_connect_fails_on_missing_credentials_file() {
        let config = config(&[("GOOGLE_APPLICATION_CREDENTIALS", "/nonexistent/creds.json")]);
        assert!(connect(&config).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_token_starts_uncancelled() {
        let token = shutdown_token();
        let child = token.child_token();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(child.is_cancelled());
    }
}
