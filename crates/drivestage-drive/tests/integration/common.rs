//! Shared helpers for the Drive integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server and
//! returns clients pointing at it.

use std::sync::Arc;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivestage_core::domain::{FileId, FolderId};
use drivestage_drive::auth::{StaticToken, TokenSource};
use drivestage_drive::client::DriveClient;

pub const TEST_TOKEN: &str = "test-access-token";

pub fn tokens() -> Arc<dyn TokenSource> {
    Arc::new(StaticToken::new(TEST_TOKEN))
}

/// Starts a mock server and returns a client pointing at it
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url(tokens(), server.uri());
    (server, client)
}

/// A Drive file resource as returned with the standard field selection
pub fn drive_file_json(id: &str, name: &str, parents: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "parents": parents,
        "mimeType": "text/plain",
        "createdTime": "2026-03-01T12:00:00.000Z",
        "modifiedTime": "2026-03-01T12:00:00.000Z"
    })
}

/// Mounts `GET /drive/v3/files/{id}` returning the given resource
pub async fn mount_get_file(server: &MockServer, id: &str, name: &str, parents: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v3/files/{id}")))
        .and(query_param(
            "fields",
            "id,name,parents,mimeType,createdTime,modifiedTime",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(drive_file_json(id, name, parents)))
        .mount(server)
        .await;
}

pub fn file_id(id: &str) -> FileId {
    FileId::new(id.to_string()).unwrap()
}

pub fn folder_id(id: &str) -> FolderId {
    FolderId::new(id.to_string()).unwrap()
}
