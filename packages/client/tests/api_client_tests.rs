// ABOUTME: HTTP-level tests for the typed API client
// ABOUTME: Uses wiremock to stand in for the DroneGuide server

use droneguide_client::{ApiClient, ClientError, GenerationApi};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_error_envelope_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analysis/validate"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "success": false,
            "error": { "code": "RATE_LIMIT_EXCEEDED", "message": "Too many requests", "retryAfter": 30 },
            "requestId": "abc"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client
        .validate("aGVsbG8=", 1, Some("user_1"), None)
        .await
        .unwrap_err();

    match &err {
        ClientError::Api { status, code, .. } => {
            assert_eq!(*status, 429);
            assert_eq!(code, "RATE_LIMIT_EXCEEDED");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_start_visualization_sends_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/visualize"))
        .and(body_partial_json(json!({
            "prompt": "a racing quad",
            "userId": "user_1",
            "projectId": "project_1"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "success": true,
            "taskId": "gen-42",
            "status": "queued",
            "message": "Image generation started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(format!("{}/", server.uri())).unwrap();
    let started = client
        .start_visualization("a racing quad", Some("user_1"), Some("project_1"))
        .await
        .unwrap();

    assert_eq!(started.task_id, "gen-42");
    assert_eq!(started.status, "queued");
}

#[tokio::test]
async fn test_progress_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/visualize/progress/gen-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "taskId": "gen-42",
            "status": "running",
            "progress": 35,
            "message": "Rendering",
            "updatedAt": "2026-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let progress = client.progress("gen-42").await.unwrap();

    assert_eq!(progress.progress, 35);
    assert!(!progress.is_completed());
    assert!(!progress.is_failed());
}

#[tokio::test]
async fn test_result_must_be_an_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/visualize/result/gen-html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/visualize/result/gen-ok"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();

    let err = client.fetch_result("gen-html").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));

    let image = client.fetch_result("gen-ok").await.unwrap();
    assert_eq!(image.content_type, "image/jpeg");
    assert_eq!(image.data, vec![0xFF, 0xD8, 0xFF]);
}
