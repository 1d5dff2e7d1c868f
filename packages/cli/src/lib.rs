// ABOUTME: DroneGuide server assembly and shared CLI plumbing
// ABOUTME: Configuration, panic recovery, logging setup and the server entry point

pub mod config;
pub mod middleware;
pub mod server;

pub use config::{Config, ConfigError};
pub use server::{build_app, run_server, serve, Services};

use droneguide_config::constants;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(constants::RUST_LOG)
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .try_init();
}
