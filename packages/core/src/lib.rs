// ABOUTME: Core types, component reconciliation and utilities for DroneGuide
// ABOUTME: Foundational package shared by storage, API, and client crates

pub mod constants;
pub mod reconcile;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export main types
pub use types::{
    default_project_name, deserialize_components, normalize_components, Component,
    ComponentFields, ComponentInput, Project, ProjectContext, Step,
};

// Re-export constants
pub use constants::{database_file, droneguide_dir, identity_file};

// Re-export reconciliation
pub use reconcile::{merge_components, MergeOutcome};

// Re-export utilities
pub use utils::{
    fingerprint, generate_project_id, generate_request_id, generate_task_id, generate_user_id,
    strip_data_url_prefix, truncate,
};

// Re-export validation
pub use validation::{
    require_text, validate_image, validate_prompt, validate_step_number, ValidationError,
};
