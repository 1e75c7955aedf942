//! Watcher notification endpoint
//!
//! Receives Drive change-channel pushes, looks up the changed file's name
//! and relays a notice to the mover. The watcher never moves files.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::StatusCode;
use tracing::{debug, error, info, warn};

use drivestage_core::domain::{decode_notice, FileId, NoticeSource};
use drivestage_core::usecases::RelayChangeUseCase;

use crate::metrics::MetricsRegistry;
use crate::server::{InboundRequest, Reply, RequestHandler};

pub const HEADER_CHANNEL_ID: &str = "x-goog-channel-id";
pub const HEADER_RESOURCE_ID: &str = "x-goog-resource-id";
pub const HEADER_RESOURCE_STATE: &str = "x-goog-resource-state";

/// Resource state sent once when a channel is created
pub const SYNC_STATE: &str = "sync";

pub const PROCESSED_MESSAGE: &str = "Notification received and processed.";

/// `POST /` handler for the watcher role
pub struct WatcherEndpoint {
    relay: RelayChangeUseCase,
    metrics: Arc<MetricsRegistry>,
}

impl WatcherEndpoint {
    pub fn new(relay: RelayChangeUseCase, metrics: Arc<MetricsRegistry>) -> Self {
        Self { relay, metrics }
    }

    fn reject(&self, message: String) -> Reply {
        warn!(reason = %message, "Unreadable change notification");
        self.metrics.record_notice(self.role(), "invalid");
        Reply::text(StatusCode::BAD_REQUEST, message)
    }
}

/// Extracts the changed resource id from a notification.
///
/// A JSON body wins; an empty body falls back to the channel headers.
fn resource_id(request: &InboundRequest) -> Result<FileId, String> {
    if request.has_body() {
        return decode_notice(&request.body)
            .map(|notice| notice.file_id)
            .map_err(|e| format!("Invalid notification payload: {e}"));
    }

    let id = request
        .header(HEADER_RESOURCE_ID)
        .ok_or_else(|| "Missing resource id".to_string())?;
    id.parse::<FileId>()
        .map_err(|e| format!("Invalid notification payload: {e}"))
}

#[async_trait]
impl RequestHandler for WatcherEndpoint {
    fn role(&self) -> &'static str {
        "watcher"
    }

    async fn handle(&self, request: InboundRequest) -> Reply {
        let channel = request.header(HEADER_CHANNEL_ID).unwrap_or("-").to_string();

        if request.header(HEADER_RESOURCE_STATE) == Some(SYNC_STATE) {
            debug!(channel = %channel, "Channel sync acknowledged");
            self.metrics.record_notice(self.role(), "sync");
            return Reply::ok(PROCESSED_MESSAGE);
        }

        let file_id = match resource_id(&request) {
            Ok(id) => id,
            Err(message) => return self.reject(message),
        };
        info!(channel = %channel, file_id = %file_id, "Change notification received");

        match self.relay.execute(&file_id, NoticeSource::DriveChannel).await {
            Ok(_) => {
                self.metrics.record_notice(self.role(), "relayed");
                Reply::ok(PROCESSED_MESSAGE)
            }
            Err(e) => {
                error!(file_id = %file_id, error = ?e, "Failed to handle change notification");
                self.metrics.record_notice(self.role(), "failed");
                Reply::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error processing notification: {e:#}"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivestage_core::testing::{InMemoryStorage, RecordingRelay, StorageOp};

    struct Harness {
        storage: Arc<InMemoryStorage>,
        relay: Arc<RecordingRelay>,
        metrics: Arc<MetricsRegistry>,
        endpoint: WatcherEndpoint,
    }

    fn harness_with(relay: RecordingRelay) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("F1", "a.txt", &["W"]);
        let relay = Arc::new(relay);
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let endpoint = WatcherEndpoint::new(
            RelayChangeUseCase::new(storage.clone(), relay.clone()),
            metrics.clone(),
        );
        Harness {
            storage,
            relay,
            metrics,
            endpoint,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingRelay::new())
    }

    #[tokio::test]
    async fn test_json_body_is_relayed_with_name() {
        let h = harness();
        let reply = h
            .endpoint
            .handle(InboundRequest::post(
                r#"{"kind": "api#channel", "id": "chan-1", "resourceId": "F1"}"#,
            ))
            .await;

        assert_eq!(reply, Reply::ok(PROCESSED_MESSAGE));
        let notices = h.relay.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].file_id.as_str(), "F1");
        assert_eq!(notices[0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(notices[0].source, NoticeSource::DriveChannel);
    }

    #[tokio::test]
    async fn test_headers_used_when_body_empty() {
        let h = harness();
        let request = InboundRequest::post("")
            .with_header(HEADER_CHANNEL_ID, "chan-1")
            .with_header(HEADER_RESOURCE_ID, "F1")
            .with_header(HEADER_RESOURCE_STATE, "add");

        let reply = h.endpoint.handle(request).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(h.relay.notices()[0].file_id.as_str(), "F1");
    }

    #[tokio::test]
    async fn test_sync_state_is_acknowledged_without_relay() {
        let h = harness();
        let request = InboundRequest::post("")
            .with_header(HEADER_CHANNEL_ID, "chan-1")
            .with_header(HEADER_RESOURCE_ID, "res-W")
            .with_header(HEADER_RESOURCE_STATE, "sync");

        let reply = h.endpoint.handle(request).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert!(h.relay.notices().is_empty());
        assert_eq!(
            h.metrics
                .notices_total
                .with_label_values(&["watcher", "sync"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_unreadable_payloads_are_bad_requests() {
        let h = harness();
        for request in [
            InboundRequest::post("{not json"),
            InboundRequest::post(r#"{"kind": "api#channel"}"#),
            InboundRequest::post(""),
            InboundRequest::post("").with_header(HEADER_RESOURCE_ID, "bad id"),
        ] {
            let reply = h.endpoint.handle(request).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        }
        assert!(h.relay.notices().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_is_server_error() {
        let h = harness();
        h.storage.fail_on(StorageOp::GetFile);

        let reply = h
            .endpoint
            .handle(InboundRequest::post(r#"{"resourceId": "F1"}"#))
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body.contains("Failed to fetch metadata for F1"));
        assert!(h.relay.notices().is_empty());
    }

    #[tokio::test]
    async fn test_relay_failure_is_server_error() {
        let h = harness_with(RecordingRelay::failing());

        let reply = h
            .endpoint
            .handle(InboundRequest::post(r#"{"resourceId": "F1"}"#))
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body.contains("Failed to relay notice for F1"));
    }

    #[tokio::test]
    async fn test_never_moves_files() {
        let h = harness();
        h.endpoint
            .handle(InboundRequest::post(r#"{"resourceId": "F1"}"#))
            .await;

        assert_eq!(h.storage.parent_update_count(), 0);
        assert_eq!(h.storage.parents_of("F1"), vec!["W"]);
    }
}
