//! Integration tests for token lifecycle and request signing.
//!
//! These tests verify that the client:
//! - Authenticates once and reuses the cached token
//! - Collapses concurrent refreshes into a single token request
//! - Signs every request with the provider's HMAC scheme
//! - Drops the token when the provider reports code 1010
//! - Does not cache failed token exchanges

use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use tuyalink_core::{ClientConfig, ClientError, Secret, Signer, TokenState, TuyaClient};
use wiremock::{
    matchers::{header, header_exists, method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

const CLIENT_ID: &str = "test-client";
const CLIENT_SECRET: &str = "test-secret";

fn test_client(server: &MockServer) -> TuyaClient {
    TuyaClient::new(ClientConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET)).unwrap()
}

fn token_response(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "t": 1700000000000i64,
        "tid": "token-tid",
        "result": {
            "access_token": access_token,
            "refresh_token": "refresh-token",
            "uid": "user-1",
            "expires_in": expires_in
        }
    }))
}

fn status_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "t": 1700000000000i64,
        "result": [{"code": "switch_1", "value": true}]
    }))
}

fn header_value<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn path_with_query(request: &Request) -> String {
    match request.url.query() {
        Some(query) => format!("{}?{}", request.url.path(), query),
        None => request.url.path().to_string(),
    }
}

/// Recompute the signature the way the provider does and compare.
fn correctly_signed(request: &Request) -> bool {
    let signer = Signer::new(CLIENT_ID, &Secret::new(CLIENT_SECRET)).unwrap();
    let Ok(t) = header_value(request, "t").parse::<i64>() else {
        return false;
    };
    let body = String::from_utf8_lossy(&request.body);
    let method = Method::from_bytes(request.method.as_str().as_bytes()).unwrap();
    let expected = signer.sign(
        &method,
        &path_with_query(request),
        &body,
        header_value(request, "access_token"),
        t,
    );
    expected.sign == header_value(request, "sign")
}

async fn mount_token(server: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .and(query_param("grant_type", "1"))
        .respond_with(token_response(access_token, 7200))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_token_request_is_signed_without_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .and(header("client_id", CLIENT_ID))
        .and(header("sign_method", "HMAC-SHA256"))
        .and(header_exists("t"))
        .and(header_exists("sign"))
        .and(|req: &Request| !req.headers.contains_key("access_token"))
        .and(correctly_signed)
        .respond_with(token_response("tok-1", 7200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .and(header("access_token", "tok-1"))
        .and(header("client_id", CLIENT_ID))
        .and(correctly_signed)
        .respond_with(status_response())
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let status = client.get_device_status("dev-1").await.unwrap();

    assert!(status.success);
    assert_eq!(status.result.unwrap()[0].code, "switch_1");
    assert_eq!(client.token_state(), TokenState::Valid);
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(status_response())
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    for _ in 0..3 {
        client.get_device_status("dev-1").await.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_callers_trigger_one_token_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(token_response("tok-1", 7200).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .and(header("access_token", "tok-1"))
        .respond_with(status_response())
        .expect(8)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let calls = (0..8).map(|_| {
        let client = client.clone();
        async move { client.get_device_status("dev-1").await }
    });

    for result in futures::future::join_all(calls).await {
        assert!(result.unwrap().success);
    }
}

#[tokio::test]
async fn test_token_invalid_status_forces_reauthentication() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(token_response("tok-1", 7200))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(token_response("tok-2", 7200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .and(header("access_token", "tok-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": 1010,
            "msg": "token invalid",
            "success": false,
            "t": 1700000000000i64
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .and(header("access_token", "tok-2"))
        .respond_with(status_response())
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let err = client.get_device_status("dev-1").await.unwrap_err();
    assert!(matches!(err, ClientError::TokenInvalid { code: 1010, .. }));
    assert!(err.is_retryable());
    assert_eq!(client.token_state(), TokenState::Absent);

    let second = client.get_device_status("dev-1").await.unwrap();
    assert!(second.success);
}

#[tokio::test]
async fn test_token_invalid_envelope_also_invalidates() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 2).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 1010,
            "msg": "token invalid",
            "t": 1700000000000i64
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(status_response())
        .mount(&server)
        .await;

    let client = test_client(&server);

    let first = client.get_device_status("dev-1").await.unwrap();
    assert!(!first.success);
    assert_eq!(first.code, Some(1010));
    assert_eq!(client.token_state(), TokenState::Absent);

    let second = client.get_device_status("dev-1").await.unwrap();
    assert!(second.success);
}

#[tokio::test]
async fn test_other_error_codes_keep_the_token() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 2001,
            "msg": "device is offline"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.get_device_status("dev-1").await;

    match result {
        Err(ClientError::Api { code, message }) => {
            assert_eq!(code, 2001);
            assert_eq!(message, "device is offline");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
    assert_eq!(client.token_state(), TokenState::Valid);
}

#[tokio::test]
async fn test_failed_authentication_is_retried_by_next_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 1004,
            "msg": "sign invalid",
            "t": 1700000000000i64
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(status_response())
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let first = client.get_device_status("dev-1").await;
    match first {
        Err(ClientError::Authentication { code, message }) => {
            assert_eq!(code, Some(1004));
            assert!(message.contains("sign invalid"));
        }
        other => panic!("Expected Authentication error, got {:?}", other),
    }
    assert_eq!(client.token_state(), TokenState::Absent);

    assert!(client.get_device_status("dev-1").await.unwrap().success);
}

#[tokio::test]
async fn test_malformed_token_result_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"uid": "user-1"}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.get_device_status("dev-1").await;

    assert!(matches!(result, Err(ClientError::Authentication { .. })));
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed_every_call() {
    let server = MockServer::start().await;

    // Lifetime inside the 60 s safety margin, reported as `expire_time`.
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {
                "access_token": "tok-short",
                "refresh_token": "r",
                "uid": "user-1",
                "expire_time": 30
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(status_response())
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client.get_device_status("dev-1").await.unwrap();
    client.get_device_status("dev-1").await.unwrap();
}

#[tokio::test]
async fn test_non_envelope_error_is_http_error() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/statistics"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    match client.get_statistics().await {
        Err(e @ ClientError::Http { .. }) => {
            assert!(e.is_retryable());
            assert!(e.to_string().contains("bad gateway"));
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_response_hits_request_timeout() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/dev-1/status"))
        .respond_with(status_response().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET)
        .with_request_timeout(Duration::from_millis(200));
    let client = TuyaClient::new(config).unwrap();

    match client.get_device_status("dev-1").await {
        Err(e @ ClientError::Network(_)) => assert!(e.is_retryable()),
        other => panic!("Expected Network error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_out_of_range_expiry_is_authentication_error() {
    for expiry in [i64::MAX, -5] {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {
                    "access_token": "tok",
                    "uid": "u",
                    "expire_time": expiry
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        match client.get_device_status("d").await {
            Err(ClientError::Authentication { code, message }) => {
                assert_eq!(code, None);
                assert!(message.contains("out of range"), "message: {}", message);
            }
            other => panic!("Expected Authentication error for {}, got {:?}", expiry, other),
        }
        assert_eq!(client.token_state(), TokenState::Absent);
    }
}
