// Integration tests for `StatusClient` using wiremock.
#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opnwatch_api::{ApiCredentials, DEFAULT_STATUS_PATH, Error, StatusClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, StatusClient) {
    let server = MockServer::start().await;
    let client =
        StatusClient::from_reqwest(&server.uri(), DEFAULT_STATUS_PATH, reqwest::Client::new())
            .unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_status_returns_object() {
    let (server, client) = setup().await;

    let body = json!({
        "carp_status": true,
        "notices": {
            "pending_notices_present": true,
            "pending_notices": ["Configuration restored"]
        },
        "firmware_update_info": {
            "status": "update",
            "download_size": 1024
        }
    });

    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let status = client.fetch_status().await.unwrap();

    assert_eq!(status.get("carp_status"), Some(&json!(true)));
    assert_eq!(
        status["notices"]["pending_notices"],
        json!(["Configuration restored"])
    );
    assert_eq!(status["firmware_update_info"]["download_size"], json!(1024));
}

#[tokio::test]
async fn test_fetch_status_sends_basic_auth() {
    let (server, client) = setup().await;
    let client = client.with_credentials(ApiCredentials {
        key: SecretString::from("key".to_string()),
        secret: SecretString::from("secret".to_string()),
    });

    // base64("key:secret")
    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.fetch_status().await.unwrap();
    assert!(status.is_empty());
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    match err {
        Error::Status { status, .. } => assert_eq!(status, 502),
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_object_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    match err {
        Error::Deserialization { message, body } => {
            assert!(message.contains("an array"), "message: {message}");
            assert_eq!(body, "[1,2,3]");
        }
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/opnwatch/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got {err:?}");
}
