#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;
use transfer_client::{ClientConfig, RetryConfig, TransferClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointed at the mock server, with intervals shrunk so the
/// supervisor/poll/resubscribe loops run in test time.
pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        endpoint: format!("{}/api", server.uri()),
        retry: RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
        },
        connect_retry_interval: Duration::from_millis(20),
        poll_interval: Duration::from_millis(20),
        stream_retry_interval: Duration::from_millis(25),
    }
}

pub fn health_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "healthy",
        "timestamp": "2025-01-01T00:00:00",
        "version": "1.0.0"
    }))
}

pub fn connect_ok(client_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "client_id": client_id,
        "status": "connected",
        "timestamp": "2025-01-01T00:00:00",
        "algorithm": "reno"
    }))
}

pub async fn mount_healthy_server(server: &MockServer, client_id: &str) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(health_ok())
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/connect"))
        .respond_with(connect_ok(client_id))
        .mount(server)
        .await;
}

/// A client that has already connected and holds `client_id`.
pub async fn connected_client(server: &MockServer, client_id: &str) -> TransferClient {
    mount_healthy_server(server, client_id).await;
    let client = TransferClient::with_config(test_config(server)).unwrap();
    client.connect().await.unwrap();
    client
}
