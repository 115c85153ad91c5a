mod common;

use common::{connect_ok, health_ok};
use reqwest::StatusCode;
use serde_json::json;
use transfer_client::TransferError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "files": [],
        "current_path": ""
    }))
}

#[tokio::test]
async fn unauthorized_response_triggers_one_reconnect_then_retries() {
    let server = MockServer::start().await;
    // One health probe for the initial connect, exactly one more for the
    // reconnect the 401 triggers.
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(health_ok())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/connect"))
        .respond_with(connect_ok("abc123"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/files/list"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/files/list"))
        .respond_with(listing_ok())
        .expect(1)
        .mount(&server)
        .await;

    let client = transfer_client::TransferClient::with_config(common::test_config(&server)).unwrap();
    client.connect().await.unwrap();

    let listing = client.list_files("").await.unwrap();
    assert!(listing.files.is_empty());
}

#[tokio::test]
async fn non_auth_failure_fails_immediately_without_retry() {
    let server = MockServer::start().await;
    let client = common::connected_client(&server, "abc123").await;

    Mock::given(method("GET"))
        .and(path("/api/files/list"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.list_files("").await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Request {
            status: StatusCode::INTERNAL_SERVER_ERROR
        }
    ));
}

#[tokio::test]
async fn unauthorized_with_no_retries_left_surfaces_the_status() {
    let server = MockServer::start().await;
    let mut config = common::test_config(&server);
    config.retry.max_retries = 0;

    common::mount_healthy_server(&server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/api/files/list"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = transfer_client::TransferClient::with_config(config).unwrap();
    client.connect().await.unwrap();

    let err = client.list_files("").await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Request {
            status: StatusCode::UNAUTHORIZED
        }
    ));
}
