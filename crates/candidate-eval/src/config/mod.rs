use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::evaluation::criteria::MAX_TTL_SECS;
use crate::evaluation::EvaluationCriteria;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let ansi = environment == AppEnvironment::Development;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, ansi },
            engine: EngineSettings::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Ledger bounds and lock behavior for the evaluation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub ttl_secs: i64,
    pub max_candidates: usize,
    pub cleanup_interval: chrono::Duration,
    /// `None` waits on a busy evaluation id indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            max_candidates: 1000,
            cleanup_interval: chrono::Duration::hours(1),
            lock_timeout: None,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ttl_secs = match env::var("EVAL_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| (1..=MAX_TTL_SECS).contains(secs))
                .ok_or(ConfigError::InvalidEngineSetting {
                    name: "EVAL_TTL_SECS",
                    value: raw,
                })?,
            Err(_) => defaults.ttl_secs,
        };

        let max_candidates = match env::var("EVAL_MAX_CANDIDATES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|max| *max > 0)
                .ok_or(ConfigError::InvalidEngineSetting {
                    name: "EVAL_MAX_CANDIDATES",
                    value: raw,
                })?,
            Err(_) => defaults.max_candidates,
        };

        let cleanup_interval = match env::var("EVAL_CLEANUP_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs >= 0 && *secs <= i64::from(u32::MAX))
                .map(chrono::Duration::seconds)
                .ok_or(ConfigError::InvalidEngineSetting {
                    name: "EVAL_CLEANUP_INTERVAL_SECS",
                    value: raw,
                })?,
            Err(_) => defaults.cleanup_interval,
        };

        let lock_timeout = match env::var("EVAL_LOCK_TIMEOUT_MS") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidEngineSetting {
                        name: "EVAL_LOCK_TIMEOUT_MS",
                        value: raw,
                    })?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            ttl_secs,
            max_candidates,
            cleanup_interval,
            lock_timeout,
        })
    }

    /// Default criteria with this configuration's ledger bounds.
    pub fn criteria(&self) -> EvaluationCriteria {
        EvaluationCriteria {
            ttl_secs: self.ttl_secs,
            max_candidates: self.max_candidates,
            ..EvaluationCriteria::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEngineSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEngineSetting { name, value } => {
                write!(f, "{name} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidEngineSetting { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
