//! Integration tests for the webhook and Pub/Sub relays

use base64::{engine::general_purpose::STANDARD, Engine as _};
use drivestage_core::domain::{FileNotice, NoticeSource};
use drivestage_core::ports::INotificationRelay;
use drivestage_drive::pubsub::PubSubRelay;
use drivestage_drive::webhook::WebhookRelay;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, file_id, TEST_TOKEN};

fn notice() -> FileNotice {
    FileNotice::new(file_id("F1"), Some("a.txt".to_string()), NoticeSource::DriveChannel)
}

// ============================================================================
// Webhook
// ============================================================================

#[tokio::test]
async fn test_webhook_posts_wire_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_json(serde_json::json!({ "fileName": "a.txt", "resourceId": "F1" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("File processed successfully"))
        .expect(1)
        .mount(&server)
        .await;

    let relay = WebhookRelay::new(format!("{}/", server.uri()));
    relay.relay(&notice()).await.expect("relay failed");
    assert_eq!(relay.transport(), "webhook");
}

#[tokio::test]
async fn test_webhook_non_success_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Error processing file"))
        .expect(1)
        .mount(&server)
        .await;

    let relay = WebhookRelay::new(server.uri());
    let err = relay.relay(&notice()).await.unwrap_err();
    assert!(format!("{err:#}").contains("Error processing file"));
}

#[tokio::test]
async fn test_webhook_unreachable_is_error() {
    let relay = WebhookRelay::new("http://127.0.0.1:1/");
    assert!(relay.relay(&notice()).await.is_err());
}

// ============================================================================
// Pub/Sub
// ============================================================================

#[tokio::test]
async fn test_pubsub_publishes_base64_notice() {
    let server = MockServer::start().await;
    let data = STANDARD.encode(r#"{"fileName":"a.txt","resourceId":"F1"}"#);

    Mock::given(method("POST"))
        .and(path("/v1/projects/p/topics/new-files:publish"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(body_json(serde_json::json!({ "messages": [ { "data": data } ] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "messageIds": ["1"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let relay = PubSubRelay::with_base_url(
        common::tokens(),
        "projects/p/topics/new-files",
        server.uri(),
    );
    relay.relay(&notice()).await.expect("publish failed");
    assert_eq!(relay.transport(), "pubsub");
}

#[tokio::test]
async fn test_pubsub_permission_denied_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let relay = PubSubRelay::with_base_url(common::tokens(), "projects/p/topics/t", server.uri());
    let err = relay.relay(&notice()).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("projects/p/topics/t"));
    assert!(msg.contains("PERMISSION_DENIED"));
}
