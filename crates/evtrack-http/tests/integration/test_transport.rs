//! HttpTransport behaviour against a mock sync server

use std::time::Duration;

use evtrack_core::domain::TransportError;
use evtrack_core::ports::ITransport;
use evtrack_http::HttpTransport;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_success_returns_status_and_body() {
    let (server, transport) = common::setup().await;
    common::mount_post(
        &server,
        "/events/poll",
        200,
        serde_json::json!({ "pollTime": "T2", "events": [] }),
    )
    .await;

    let response = transport
        .post(&common::url(&server, "/events/poll"), b"{}".to_vec())
        .await
        .expect("post");

    assert_eq!(response.status, 200);
    let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(value["pollTime"], "T2");
}

#[tokio::test]
async fn test_request_body_is_sent_verbatim() {
    let (server, transport) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/events/upload_bulk"))
        .and(body_json(serde_json::json!({ "uuid": "A", "name": "Lunch" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport
        .post(
            &common::url(&server, "/events/upload_bulk"),
            br#"{"uuid":"A","name":"Lunch"}"#.to_vec(),
        )
        .await
        .expect("post");
}

#[tokio::test]
async fn test_server_error_is_transient_status() {
    let (server, transport) = common::setup().await;
    common::mount_post(&server, "/users/init", 503, serde_json::json!({ "error": "busy" })).await;

    let err = transport
        .post(&common::url(&server, "/users/init"), b"{}".to_vec())
        .await
        .unwrap_err();

    match err {
        TransportError::Status { status, ref body } => {
            assert_eq!(status, 503);
            assert!(body.contains("busy"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let (server, transport) = common::setup().await;
    common::mount_post(&server, "/events/delete", 400, serde_json::json!({})).await;

    let err = transport
        .post(&common::url(&server, "/events/delete"), b"{}".to_vec())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Status {
            status: 400,
            body: "{}".to_string()
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (server, transport) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/events/poll"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = transport
        .post(&common::url(&server, "/events/poll"), b"{}".to_vec())
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout);
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();

    let err = transport
        .post("http://127.0.0.1:9/events/poll", b"{}".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Unreachable(_)));
    assert!(err.is_transient());
}
