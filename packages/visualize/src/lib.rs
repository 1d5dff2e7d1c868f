// ABOUTME: Image generation orchestration for assembly visualizations
// ABOUTME: Downstream service abstraction, its HTTP client, and the task-driving orchestrator

pub mod backend;
pub mod http;
pub mod orchestrator;

pub use backend::{
    BackendError, BackendResult, GenerationRequest, ImageBackend, RemoteProgress, RemoteStatus,
};
pub use http::HttpImageBackend;
pub use orchestrator::{
    GenerationError, GenerationOrchestrator, GenerationResult, OrchestratorConfig,
};
