//! Integration tests for the JSON request client using wiremock.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatwire::{api_request, api_request_as, ApiClient, ChatMessage, ClientError, RequestOptions};

#[tokio::test]
async fn test_get_parses_json_with_default_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessions": ["s-1"]})))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/sessions", server.uri());
    let value = api_request(&url, &RequestOptions::default()).await.unwrap();

    assert_eq!(value, json!({"sessions": ["s-1"]}));
}

#[tokio::test]
async fn test_caller_headers_override_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .and(header("content-type", "text/plain"))
        .and(header("x-session", "s-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let headers = HashMap::from([
        ("Content-Type".to_string(), "text/plain".to_string()),
        ("X-Session".to_string(), "s-9".to_string()),
    ]);
    let options = RequestOptions::new().with_headers(headers);

    let url = format!("{}/plain", server.uri());
    assert_eq!(api_request(&url, &options).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_post_json_body_typed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"question": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "hello",
            "sessionId": "s-2",
            "histories": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = RequestOptions::new()
        .with_method(Method::POST)
        .with_json(&json!({"question": "hi"}))
        .unwrap();

    let url = format!("{}/chat", server.uri());
    let message: ChatMessage = api_request_as(&url, &options).await.unwrap();

    assert_eq!(message.token.as_deref(), Some("hello"));
    assert_eq!(message.session_id, "s-2");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exploded"))
        .mount(&server)
        .await;

    let err = api_request(&server.uri(), &RequestOptions::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = api_request(&server.uri(), &RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Parse(_)));
}

#[tokio::test]
async fn test_empty_body_is_not_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = api_request(&server.uri(), &RequestOptions::default()).await;
    assert!(matches!(result, Err(ClientError::Parse(_))));
}

#[tokio::test]
async fn test_empty_url_sends_nothing() {
    let server = MockServer::start().await;

    let err = api_request("", &RequestOptions::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_api_client_base_url_and_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/history/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([["q", "a"]])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/history/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(RequestOptions::default())
        .unwrap()
        .with_base_url(format!("{}/api/", server.uri()));

    let history: serde_json::Value = client.request("/history/s-1").await.unwrap();
    assert_eq!(history, json!([["q", "a"]]));

    let options = RequestOptions::new().with_method(Method::DELETE);
    let deleted: serde_json::Value = client
        .request_with_options("history/s-1", &options)
        .await
        .unwrap();
    assert_eq!(deleted, json!({"deleted": true}));
}
