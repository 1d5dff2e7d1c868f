// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Every tunable falls back to a default from droneguide-config

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use droneguide_api::RateLimitConfig;
use droneguide_config::{constants, defaults};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid host address: {0}")]
    InvalidHost(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub cors_origin: String,
    pub database_path: PathBuf,
    pub image_service_url: String,
    pub generation_poll_interval: Duration,
    pub generation_max_duration: Duration,
    pub task_max_age: Duration,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var(constants::PORT) {
            Some(raw) => raw.trim().parse::<u16>()?,
            None => defaults::PORT,
        };
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let host_raw = var(constants::HOST).unwrap_or_else(|| defaults::HOST.to_string());
        let host = host_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_raw.clone()))?;

        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            parse_or(var(name), name, default)
        };

        let poll_secs = number(
            constants::GENERATION_POLL_INTERVAL_SECS,
            defaults::GENERATION_POLL_INTERVAL_SECS,
        )?;
        let max_minutes = number(
            constants::GENERATION_MAX_DURATION_MINUTES,
            defaults::GENERATION_MAX_DURATION_MINUTES,
        )?;
        let task_minutes = number(constants::TASK_MAX_AGE_MINUTES, defaults::TASK_MAX_AGE_MINUTES)?;
        let cache_ms = number(constants::CACHE_TTL_MS, defaults::CACHE_TTL_MS)?;
        let sweep_secs = number(
            constants::CACHE_SWEEP_INTERVAL_SECS,
            defaults::CACHE_SWEEP_INTERVAL_SECS,
        )?;

        let rate_limit = RateLimitConfig {
            enabled: parse_or(var(constants::RATE_LIMIT_ENABLED), constants::RATE_LIMIT_ENABLED, true)?,
            analysis_rpm: parse_or(
                var(constants::RATE_LIMIT_ANALYSIS_RPM),
                constants::RATE_LIMIT_ANALYSIS_RPM,
                defaults::RATE_LIMIT_ANALYSIS_RPM,
            )?,
        };

        Ok(Config {
            host,
            port,
            cors_origin: var(constants::CORS_ORIGIN)
                .unwrap_or_else(|| defaults::CORS_ORIGIN.to_string()),
            database_path: var(constants::DATABASE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(droneguide_core::database_file),
            image_service_url: var(constants::IMAGE_SERVICE_URL)
                .unwrap_or_else(|| defaults::IMAGE_SERVICE_URL.to_string()),
            generation_poll_interval: Duration::from_secs(poll_secs.max(1)),
            generation_max_duration: Duration::from_secs(max_minutes * 60),
            task_max_age: Duration::from_secs(task_minutes * 60),
            cache_ttl: Duration::from_millis(cache_ms),
            cache_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            rate_limit,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.cors_origin, "http://localhost:5173");
        assert_eq!(config.image_service_url, "http://localhost:5001");
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.generation_max_duration, Duration::from_secs(30 * 60));
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.analysis_rpm, 20);
        assert!(config.database_path.ends_with("droneguide.db"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("DATABASE_PATH", "/tmp/dg.db"),
            ("CACHE_TTL_MS", "250"),
            ("RATE_LIMIT_ENABLED", "false"),
            ("RATE_LIMIT_ANALYSIS_RPM", "5"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("/tmp/dg.db"));
        assert_eq!(config.cache_ttl, Duration::from_millis(250));
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.analysis_rpm, 5);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("PORT", "  "), ("CORS_ORIGIN", "")]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.cors_origin, "http://localhost:5173");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(load(&[("PORT", "0")]), Err(ConfigError::PortOutOfRange(0))));
        assert!(matches!(load(&[("PORT", "abc")]), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(load(&[("HOST", "nowhere")]), Err(ConfigError::InvalidHost(_))));
        assert!(matches!(
            load(&[("CACHE_TTL_MS", "-1")]),
            Err(ConfigError::InvalidValue { name: "CACHE_TTL_MS", .. })
        ));
    }
}
