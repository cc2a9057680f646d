//! Shared test helpers for transport integration tests

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use evtrack_http::HttpTransport;

/// Starts a mock server and a transport with a short timeout
pub async fn setup() -> (MockServer, HttpTransport) {
    let server = MockServer::start().await;
    let transport = HttpTransport::new(Duration::from_millis(500)).expect("build transport");
    (server, transport)
}

/// Mounts a JSON POST endpoint answering with `status` and `body`
pub async fn mount_post(server: &MockServer, endpoint: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub fn url(server: &MockServer, endpoint: &str) -> String {
    format!("{}{}", server.uri(), endpoint)
}
