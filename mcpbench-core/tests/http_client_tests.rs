//! HTTP client behavior against a mocked provider endpoint

use mcpbench_core::http::{HttpClient, HttpExecutor, HttpRequest, RequestOptions};
use mcpbench_core::providers::error::{ErrorClass, ProviderError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_body() -> Value {
    json!({
        "model": "test-model",
        "messages": [{"role": "user", "content": "Test message"}]
    })
}

fn chat_reply() -> Value {
    json!({
        "id": "test-id",
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Test response"},
            "finish_reason": "stop"
        }]
    })
}

fn request_to(server: &MockServer) -> HttpRequest {
    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), "Bearer test-key".to_string());
    HttpRequest {
        url: format!("{}/chat/completions", server.uri()),
        headers,
        body: chat_body(),
    }
}

/// Test successful JSON response
#[tokio::test]
async fn test_success_json_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header_exists("X-Request-ID"))
        .and(body_json(chat_body()))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let result = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await;

    let response = result.expect("Expected successful response");
    assert_eq!(response["id"], "test-id");
    assert_eq!(response["choices"].as_array().map(Vec::len), Some(1));
}

/// Test request ID header matches the options
#[tokio::test]
async fn test_request_id_header_sent() {
    let mock_server = MockServer::start().await;
    let options = RequestOptions::new();

    Mock::given(method("POST"))
        .and(header("X-Request-ID", options.request_id.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    assert!(client.execute_json(request_to(&mock_server), options).await.is_ok());
}

/// Test deserialization failure with malformed JSON
#[tokio::test]
async fn test_malformed_json_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{ invalid json }")
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let result = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await;

    match result.unwrap_err() {
        ProviderError::Protocol(message) => assert!(message.contains("Invalid response format")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

/// Test request timeout is retryable
#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(chat_reply()),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(Duration::from_millis(500), 10).expect("Failed to create client");
    let options = RequestOptions::new().with_timeout(Duration::from_millis(200));

    let err = client
        .execute_json(request_to(&mock_server), options)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout(_)), "got {:?}", err);
    assert_eq!(err.class(), ErrorClass::Retryable);
}

/// Test content-type validation (reject non-JSON)
#[tokio::test]
async fn test_content_type_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Not JSON</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let result = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await;

    match result.unwrap_err() {
        ProviderError::Protocol(message) => assert!(message.contains("Expected application/json")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

/// Test response size limit
#[tokio::test]
async fn test_response_size_limit() {
    let mock_server = MockServer::start().await;

    let mut large_reply = chat_reply();
    large_reply["choices"][0]["message"]["content"] = json!("x".repeat(4096));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(large_reply))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new()
        .expect("Failed to create client")
        .with_max_response_size(1024);
    let result = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await;

    match result.unwrap_err() {
        ProviderError::Protocol(message) => assert!(message.contains("exceeds maximum")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

#[test_case(401, "unauthorized", ErrorClass::Fatal ; "unauthorized")]
#[test_case(403, "unauthorized", ErrorClass::Fatal ; "forbidden")]
#[test_case(429, "rate_limited", ErrorClass::Retryable ; "rate limited")]
#[test_case(408, "timeout", ErrorClass::Retryable ; "request timeout")]
#[test_case(504, "timeout", ErrorClass::Retryable ; "gateway timeout")]
#[test_case(500, "server_error", ErrorClass::Retryable ; "internal error")]
#[test_case(503, "server_error", ErrorClass::Retryable ; "unavailable")]
#[test_case(400, "protocol", ErrorClass::Fatal ; "bad request")]
#[test_case(404, "protocol", ErrorClass::Fatal ; "not found")]
#[tokio::test]
async fn test_status_classification(status: u16, kind: &str, class: ErrorClass) {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let err = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), kind);
    assert_eq!(err.class(), class);
}

/// Test 429 Rate Limit with Retry-After header
#[tokio::test]
async fn test_429_with_retry_after_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let err = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
}

/// Test 500 Internal Server Error keeps the provider message
#[tokio::test]
async fn test_500_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("{\"error\": {\"message\": \"Internal server error\"}}"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let err = client
        .execute_json(request_to(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        ProviderError::ServerError { status_code, message } => {
            assert_eq!(status_code, 500);
            assert!(message.contains("Internal server error"));
        }
        other => panic!("Expected ServerError, got {:?}", other),
    }
}

/// Test request ID is included in error messages
#[tokio::test]
async fn test_request_id_in_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().expect("Failed to create client");
    let options = RequestOptions::new();
    let request_id = options.request_id;

    let err = client
        .execute_json(request_to(&mock_server), options)
        .await
        .unwrap_err();

    assert!(err.to_string().contains(&request_id.to_string()));
}

/// Test connection failures are network errors
#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = HttpClient::with_config(Duration::from_millis(500), 1).expect("Failed to create client");
    let request = HttpRequest {
        url: "http://127.0.0.1:9/chat/completions".to_string(),
        headers: HashMap::new(),
        body: chat_body(),
    };

    let err = client
        .execute_json(request, RequestOptions::new().with_timeout(Duration::from_secs(2)))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)),
        "got {:?}",
        err
    );
}
