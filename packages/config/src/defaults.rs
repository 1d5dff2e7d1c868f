// ABOUTME: Default values for tunables that can be overridden from the environment
// ABOUTME: Durations are expressed in the unit named by the constant

pub const PORT: u16 = 3001;
pub const HOST: &str = "0.0.0.0";
pub const CORS_ORIGIN: &str = "http://localhost:5173";

pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const IMAGE_SERVICE_URL: &str = "http://localhost:5001";
pub const GENERATION_POLL_INTERVAL_SECS: u64 = 2;
pub const GENERATION_MAX_DURATION_MINUTES: u64 = 30;
pub const TASK_MAX_AGE_MINUTES: u64 = 60;

pub const CACHE_TTL_MS: u64 = 5_000;
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

pub const RATE_LIMIT_ANALYSIS_RPM: u32 = 20;

pub const API_URL: &str = "http://localhost:3001";
