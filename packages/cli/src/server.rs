// ABOUTME: Builds and runs the DroneGuide HTTP server
// ABOUTME: Wires storage, model, cache and generation orchestrator into the API router

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use droneguide_ai::{AssemblyAssistant, GeminiService, GenerativeModel};
use droneguide_api::{create_api_router, AppState, RateLimitLayer};
use droneguide_cache::{CacheConfig, ResponseCache};
use droneguide_storage::{ProjectStorage, SqliteProjectStorage};
use droneguide_tasks::{TaskStore, TaskStoreConfig};
use droneguide_visualize::{GenerationOrchestrator, HttpImageBackend, OrchestratorConfig};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::middleware::create_panic_handler;

/// How often expired generation tasks are purged
const JANITOR_INTERVAL_SECS: u64 = 60;

/// Application state plus the background loops that keep it tidy
pub struct Services {
    pub state: AppState,
    background: Vec<JoinHandle<()>>,
}

impl Services {
    /// Open storage and start the cache sweeper and task janitor
    pub async fn start(config: &Config, model: Arc<dyn GenerativeModel>) -> anyhow::Result<Self> {
        let storage = SqliteProjectStorage::connect(&config.database_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.database_path.display())
            })?;
        info!(path = %config.database_path.display(), "Project storage ready");

        let cache = ResponseCache::new(CacheConfig {
            ttl: config.cache_ttl,
            sweep_interval: config.cache_sweep_interval,
        });

        let tasks = TaskStore::new(TaskStoreConfig {
            max_age: config.task_max_age,
            ..TaskStoreConfig::default()
        });

        let backend = HttpImageBackend::new(config.image_service_url.clone())
            .context("Failed to create image service client")?;
        let orchestrator = GenerationOrchestrator::new(
            tasks.clone(),
            Arc::new(backend),
            OrchestratorConfig {
                poll_interval: config.generation_poll_interval,
                max_duration: config.generation_max_duration,
                ..OrchestratorConfig::default()
            },
        );

        let background = vec![
            cache.spawn_sweeper(),
            tasks.spawn_janitor(std::time::Duration::from_secs(JANITOR_INTERVAL_SECS)),
        ];

        Ok(Self {
            state: AppState {
                storage: Arc::new(storage) as Arc<dyn ProjectStorage>,
                assistant: AssemblyAssistant::new(model),
                cache,
                orchestrator,
            },
            background,
        })
    }

    /// Stop background loops and abandon in-flight generations
    pub fn shutdown(self) {
        let active = self.state.orchestrator.active_count();
        if active > 0 {
            warn!(active, "Abandoning in-flight generations");
        }
        self.state.orchestrator.shutdown();
        for handle in self.background {
            handle.abort();
        }
    }
}

/// The full router: API routes, CORS, panic recovery and request tracing
pub fn build_app(config: &Config, state: AppState) -> anyhow::Result<Router> {
    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(create_api_router(state, RateLimitLayer::new(config.rate_limit))
        .layer(create_panic_handler())
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Run the server with the Gemini model until Ctrl-C
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let model = GeminiService::from_env().context("Failed to create Gemini client")?;
    if !model.has_api_key() {
        warn!("GEMINI_API_KEY is not set; analysis requests will return 503");
    }

    let services = Services::start(&config, Arc::new(model)).await?;
    let app = build_app(&config, services.state.clone())?;

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, cors_origin = %config.cors_origin, "DroneGuide server listening");

    serve(listener, app, shutdown_signal()).await?;

    info!("Shutting down");
    services.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
