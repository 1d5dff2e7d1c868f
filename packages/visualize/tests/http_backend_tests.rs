// ABOUTME: Tests for the HTTP image service client against a mock server
// ABOUTME: Verifies request shape, status mapping and error classification

use droneguide_visualize::{
    BackendError, GenerationRequest, HttpImageBackend, ImageBackend, RemoteStatus,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "drone frame".to_string(),
        user_id: Some("user-1".to_string()),
        project_id: Some("proj-1".to_string()),
    }
}

#[tokio::test]
async fn test_submit_sends_async_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(json!({
            "prompt": "drone frame",
            "userId": "user-1",
            "projectId": "proj-1",
            "async": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "abc-123",
            "status": "processing"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    assert_eq!(backend.submit(&request()).await.unwrap(), "abc-123");
}

#[tokio::test]
async fn test_submit_busy_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": "Server busy"})),
        )
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    assert!(matches!(
        backend.submit(&request()).await,
        Err(BackendError::Busy)
    ));
}

#[tokio::test]
async fn test_submit_server_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "model not loaded"})),
        )
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(format!("{}/", server.uri())).unwrap();
    match backend.submit(&request()).await {
        Err(BackendError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model not loaded");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_progress_maps_stage_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "generating",
            "progress": 42.6,
            "message": "Generating image... step 12/30",
            "timestamp": 1_700_000_000
        })))
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    let progress = backend.progress("abc-123").await.unwrap();
    assert_eq!(progress.status, RemoteStatus::Running);
    assert_eq!(progress.progress, 43);
    assert!(progress.message.contains("step 12/30"));
}

#[tokio::test]
async fn test_progress_unknown_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Task not found"})))
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    assert!(matches!(
        backend.progress("missing").await,
        Err(BackendError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_fetch_returns_image_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result/abc-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"),
        )
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    let image = backend.fetch("abc-123").await.unwrap();
    assert_eq!(image.content_type, "image/jpeg");
    assert_eq!(image.data.as_slice(), &[0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn test_fetch_before_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result/abc-123"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Task not completed"})),
        )
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    let err = backend.fetch("abc-123").await.unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_fetch_rejects_non_image_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let backend = HttpImageBackend::new(server.uri()).unwrap();
    assert!(matches!(
        backend.fetch("abc-123").await,
        Err(BackendError::InvalidResponse(_))
    ));
}
