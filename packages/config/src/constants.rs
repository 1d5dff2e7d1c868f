// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across DroneGuide

// Server
pub const PORT: &str = "PORT";
pub const HOST: &str = "HOST";
pub const CORS_ORIGIN: &str = "CORS_ORIGIN";

// Generative model
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const GEMINI_API_URL: &str = "GEMINI_API_URL";

// Image generation service
pub const IMAGE_SERVICE_URL: &str = "IMAGE_SERVICE_URL";
pub const GENERATION_POLL_INTERVAL_SECS: &str = "GENERATION_POLL_INTERVAL_SECS";
pub const GENERATION_MAX_DURATION_MINUTES: &str = "GENERATION_MAX_DURATION_MINUTES";
pub const TASK_MAX_AGE_MINUTES: &str = "TASK_MAX_AGE_MINUTES";

// Persistence
pub const DATABASE_PATH: &str = "DATABASE_PATH";

// Response cache
pub const CACHE_TTL_MS: &str = "CACHE_TTL_MS";
pub const CACHE_SWEEP_INTERVAL_SECS: &str = "CACHE_SWEEP_INTERVAL_SECS";

// Rate limiting
pub const RATE_LIMIT_ENABLED: &str = "RATE_LIMIT_ENABLED";
pub const RATE_LIMIT_ANALYSIS_RPM: &str = "RATE_LIMIT_ANALYSIS_RPM";

// Client
pub const DRONEGUIDE_API_URL: &str = "DRONEGUIDE_API_URL";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
