// ABOUTME: Asynchronous image generation task registry
// ABOUTME: Task lifecycle types and the shared in-memory store

pub mod store;
pub mod types;

pub use store::{TaskError, TaskResult, TaskStore, TaskStoreConfig};
pub use types::{GeneratedImage, GenerationTask, TaskPatch, TaskStatus};
