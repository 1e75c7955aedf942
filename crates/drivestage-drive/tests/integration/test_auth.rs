//! Integration tests for credential loading and token minting

use std::io::Write;

use drivestage_core::config::CredentialsConfig;
use drivestage_drive::auth::{
    token_source_from_config, MetadataServerSource, TokenSource,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");
const PUBLIC_KEY: &str = include_str!("../fixtures/service_account_pub.pem");

fn write_credentials(json: serde_json::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(json.to_string().as_bytes()).expect("write credentials");
    file
}

fn config_for(file: &tempfile::NamedTempFile) -> CredentialsConfig {
    CredentialsConfig {
        credentials_file: Some(file.path().to_path_buf()),
        access_token: None,
    }
}

#[tokio::test]
async fn test_service_account_jwt_grant() {
    let server = MockServer::start().await;
    let token_uri = format!("{}/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sa-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let creds = write_credentials(serde_json::json!({
        "type": "service_account",
        "project_id": "my-project",
        "private_key_id": "key-1",
        "private_key": PRIVATE_KEY,
        "client_email": "svc@my-project.iam.gserviceaccount.com",
        "token_uri": token_uri
    }));

    let source = token_source_from_config(&config_for(&creds)).expect("token source");
    assert_eq!(source.kind(), "service_account");

    // Second call is served from the cache; the mock expects one hit.
    assert_eq!(source.access_token().await.unwrap(), "sa-token");
    assert_eq!(source.access_token().await.unwrap(), "sa-token");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let assertion = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .expect("assertion in form body");

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[token_uri.as_str()]);
    let decoded = jsonwebtoken::decode::<serde_json::Value>(
        assertion,
        &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
        &validation,
    )
    .expect("assertion verifies");

    assert_eq!(decoded.header.kid.as_deref(), Some("key-1"));
    assert_eq!(
        decoded.claims["iss"],
        "svc@my-project.iam.gserviceaccount.com"
    );
    assert!(decoded.claims["scope"]
        .as_str()
        .unwrap()
        .contains("https://www.googleapis.com/auth/drive"));
}

#[tokio::test]
async fn test_service_account_rejected_grant_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let creds = write_credentials(serde_json::json!({
        "type": "service_account",
        "private_key": PRIVATE_KEY,
        "client_email": "svc@my-project.iam.gserviceaccount.com",
        "token_uri": format!("{}/token", server.uri())
    }));

    let source = token_source_from_config(&config_for(&creds)).unwrap();
    let err = source.access_token().await.unwrap_err();
    assert!(format!("{err:#}").contains("invalid_grant"));
}

#[tokio::test]
async fn test_authorized_user_refresh_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "user-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let creds = write_credentials(serde_json::json!({
        "type": "authorized_user",
        "client_id": "cid.apps.googleusercontent.com",
        "client_secret": "secret",
        "refresh_token": "rt-1",
        "token_uri": format!("{}/token", server.uri())
    }));

    let source = token_source_from_config(&config_for(&creds)).unwrap();
    assert_eq!(source.kind(), "authorized_user");
    assert_eq!(source.access_token().await.unwrap(), "user-token");
    assert_eq!(source.access_token().await.unwrap(), "user-token");
}

#[tokio::test]
async fn test_metadata_server_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "md-token",
            "expires_in": 1800,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = MetadataServerSource::with_base_url(server.uri());
    assert_eq!(source.access_token().await.unwrap(), "md-token");
    assert_eq!(source.access_token().await.unwrap(), "md-token");
}

#[test]
fn test_malformed_credentials_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();

    let err = token_source_from_config(&config_for(&file)).err().unwrap();
    assert!(err.to_string().contains("Failed to parse credentials file"));
}
