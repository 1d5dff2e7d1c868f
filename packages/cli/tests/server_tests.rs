// ABOUTME: End-to-end tests of the assembled server: storage file, CORS and model wiring
// ABOUTME: Runs against a temporary database with no model API key configured

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use droneguide_ai::GeminiService;
use droneguide_cli::{build_app, serve, Config, Services};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::oneshot;

struct Running {
    base_url: String,
    client: reqwest::Client,
    stop: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    services: Services,
    _dir: TempDir,
}

async fn start() -> Running {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data").join("droneguide.db");
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_PATH", db.display().to_string()),
        ("CORS_ORIGIN", "http://localhost:5173".to_string()),
    ]);
    let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();

    let model = GeminiService::new(None, "gemini-2.0-flash").unwrap();
    let services = Services::start(&config, Arc::new(model)).await.unwrap();
    let app = build_app(&config, services.state.clone()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, app, async move {
        let _ = stopped.await;
    }));

    assert!(db.exists());

    Running {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        stop,
        server,
        services,
        _dir: dir,
    }
}

impl Running {
    async fn finish(self) {
        drop(self.client);
        let _ = self.stop.send(());
        self.server.await.unwrap().unwrap();
        self.services.shutdown();
    }
}

#[tokio::test]
async fn test_health_with_cors() {
    let running = start().await;

    let response = running
        .client
        .get(format!("{}/api/health", running.base_url))
        .header("Origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["activeGenerations"], 0);

    running.finish().await;
}

#[tokio::test]
async fn test_missing_api_key_reports_unconfigured_model() {
    let running = start().await;

    let response = running
        .client
        .get(format!("{}/api/analysis/test", running.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "MODEL_NOT_CONFIGURED");

    running.finish().await;
}

#[tokio::test]
async fn test_projects_persist_in_database_file() {
    let running = start().await;

    let response = running
        .client
        .post(format!("{}/api/project/initialize", running.base_url))
        .json(&json!({ "userId": "user_cli", "droneType": "racing quadcopter" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let project_id = body["project"]["projectId"].as_str().unwrap().to_string();
    assert!(body["welcomeMessage"]
        .as_str()
        .unwrap()
        .contains("DroneGuide"));

    let listed: Value = running
        .client
        .get(format!("{}/api/project/user_cli", running.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let projects = listed["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["projectId"], project_id);
    assert_eq!(projects[0]["droneType"], "racing quadcopter");

    running.finish().await;
}
