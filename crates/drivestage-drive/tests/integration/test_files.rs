//! Integration tests for the Drive v3 file endpoints

use chrono::{TimeZone, Utc};
use drivestage_core::ports::{WatchChannel, WatchRequest};
use drivestage_drive::{files, DriveError};
use wiremock::matchers::{
    body_json, body_partial_json, body_string_contains, header, header_regex, method, path,
    query_param, query_param_is_missing,
};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_id, folder_id, TEST_TOKEN};

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_get_file_returns_parents() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_get_file(&server, "F1", "a.txt", &["I"]).await;

    let file = files::get_file(&client, &file_id("F1"))
        .await
        .expect("get_file failed");

    assert_eq!(file.id, "F1");
    assert_eq!(file.name, "a.txt");
    assert_eq!(file.parents, vec!["I"]);
}

#[tokio::test]
async fn test_get_file_sends_bearer_token() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F1"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::drive_file_json("F1", "a", &["I"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    files::get_file(&client, &file_id("F1")).await.unwrap();
}

#[tokio::test]
async fn test_get_file_not_found_is_classified() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found: F404."))
        .mount(&server)
        .await;

    let err = files::get_file(&client, &file_id("F404")).await.unwrap_err();

    assert!(err
        .chain()
        .any(|e| matches!(e.downcast_ref::<DriveError>(), Some(DriveError::NotFound(_)))));
    assert!(format!("{err:#}").contains("F404"));
}

#[tokio::test]
async fn test_shared_drive_flag_sent() {
    let server = wiremock::MockServer::start().await;
    let client = drivestage_drive::client::DriveClient::with_base_url(common::tokens(), server.uri())
        .with_drive_id(Some("0ADRIVE".to_string()));
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("supportsAllDrives", "true"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::drive_file_json("F1", "a", &["I"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    files::get_file(&client, &file_id("F1")).await.unwrap();
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_children_follows_pages() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'W' in parents and trashed = false"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [common::drive_file_json("A", "a.txt", &["W"])],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                common::drive_file_json("B", "b.txt", &["W"]),
                common::drive_file_json("C", "c.txt", &["W"])
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listed = files::list_children(&client, &folder_id("W"))
        .await
        .expect("list_children failed");

    let ids: Vec<&str> = listed.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_list_children_shared_drive_corpus() {
    let server = wiremock::MockServer::start().await;
    let client = drivestage_drive::client::DriveClient::with_base_url(common::tokens(), server.uri())
        .with_drive_id(Some("0ADRIVE".to_string()));

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("includeItemsFromAllDrives", "true"))
        .and(query_param("corpora", "drive"))
        .and(query_param("driveId", "0ADRIVE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let listed = files::list_children(&client, &folder_id("W")).await.unwrap();
    assert!(listed.is_empty());
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_update_parents_sends_remove_and_add() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("removeParents", "I"))
        .and(query_param("addParents", "S"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::drive_file_json("F1", "a.txt", &["S"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = files::update_parents(&client, &file_id("F1"), &folder_id("I"), &folder_id("S"))
        .await
        .expect("update_parents failed");

    assert_eq!(file.parents, vec!["S"]);
}

#[tokio::test]
async fn test_update_parents_error_names_target() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/F1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficientFilePermissions"))
        .mount(&server)
        .await;

    let err = files::update_parents(&client, &file_id("F1"), &folder_id("I"), &folder_id("S"))
        .await
        .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("F1"));
    assert!(msg.contains("to S"));
    assert!(msg.contains("insufficientFilePermissions"));
}

#[tokio::test]
async fn test_download_uses_alt_media() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file body".to_vec()))
        .mount(&server)
        .await;

    let data = files::download(&client, &file_id("F1")).await.unwrap();
    assert_eq!(data, b"file body");
}

#[tokio::test]
async fn test_create_with_content_uses_multipart_upload() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_regex("content-type", "^multipart/related; boundary=.+$"))
        .and(body_string_contains(r#""parents":["O"]"#))
        .and(body_string_contains("file body"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("NEW1", "a.txt", &["O"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = files::create_with_content(
        &client,
        "a.txt",
        &folder_id("O"),
        Some("text/plain"),
        b"file body",
    )
    .await
    .expect("create failed");

    assert_eq!(created.id, "NEW1");
    assert_eq!(created.parents, vec!["O"]);
}

// ============================================================================
// Channels
// ============================================================================

#[tokio::test]
async fn test_watch_registers_web_hook_channel() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/W/watch"))
        .and(body_partial_json(serde_json::json!({
            "id": "chan-1",
            "type": "web_hook",
            "address": "https://watcher.example.com/",
            "token": "projects/p/topics/t"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "api#channel",
            "id": "chan-1",
            "resourceId": "res-42",
            "resourceUri": "https://www.googleapis.com/drive/v3/files/W",
            "expiration": "1772366400000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = WatchRequest {
        channel_id: "chan-1".to_string(),
        address: "https://watcher.example.com/".to_string(),
        token: Some("projects/p/topics/t".to_string()),
        expiration: None,
    };
    let channel = files::watch(&client, &folder_id("W"), &request)
        .await
        .expect("watch failed");

    assert_eq!(channel.id, "chan-1");
    assert_eq!(channel.resource_id, "res-42");
    assert_eq!(
        channel.expiration,
        Utc.timestamp_millis_opt(1_772_366_400_000).single()
    );
}

#[tokio::test]
async fn test_watch_failure_is_error() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/W/watch"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Unauthorized WebHook callback"))
        .mount(&server)
        .await;

    let request = WatchRequest {
        channel_id: "chan-1".to_string(),
        address: "https://watcher.example.com/".to_string(),
        token: None,
        expiration: None,
    };
    let err = files::watch(&client, &folder_id("W"), &request).await.unwrap_err();
    assert!(format!("{err:#}").contains("Unauthorized WebHook callback"));
}

#[tokio::test]
async fn test_stop_channel() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/channels/stop"))
        .and(body_json(serde_json::json!({ "id": "chan-1", "resourceId": "res-42" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let channel = WatchChannel {
        id: "chan-1".to_string(),
        resource_id: "res-42".to_string(),
        resource_uri: None,
        expiration: None,
    };
    files::stop_channel(&client, &channel).await.expect("stop failed");
}
