use std::time::Duration;
use telehealth_core::config::{
    DEFAULT_API_BASE_URL, DEFAULT_RELAY_URL, SessionConfig, TransportKind, WaitingPolicy,
};
use telehealth_core::model::Role;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub relay_url: String,
    pub api_base_url: String,
    pub transport: TransportKind,
    pub poll_interval: Duration,
    pub waiting_policy: WaitingPolicy,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let relay_url = non_empty("RELAY_URL")?.unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        if !relay_url.starts_with("ws://") && !relay_url.starts_with("wss://") {
            return Err(ConfigError::InvalidValue(
                "RELAY_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", relay_url),
            ));
        }

        let api_base_url =
            non_empty("API_BASE_URL")?.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let transport = std::env::var("TRANSPORT")
            .unwrap_or_else(|_| "raw".to_string())
            .parse::<TransportKind>()
            .map_err(|e| ConfigError::InvalidValue("TRANSPORT".to_string(), e))?;

        let poll_secs_str =
            std::env::var("POLL_INTERVAL_SECS").unwrap_or_else(|_| "5".to_string());
        let poll_secs = poll_secs_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "POLL_INTERVAL_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", poll_secs_str),
                )
            })?;

        let waiting_policy = std::env::var("WAITING_POLICY")
            .unwrap_or_else(|_| "latch".to_string())
            .parse::<WaitingPolicy>()
            .map_err(|e| ConfigError::InvalidValue("WAITING_POLICY".to_string(), e))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            relay_url,
            api_base_url,
            transport,
            poll_interval: Duration::from_secs(poll_secs),
            waiting_policy,
            log_level,
        })
    }

    /// The session settings for `role`, with library defaults for everything
    /// the environment does not cover.
    pub fn session(&self, role: Role) -> SessionConfig {
        let mut session = SessionConfig::new(role);
        session.transport = self.transport;
        session.relay_url = self.relay_url.clone();
        session.api_base_url = self.api_base_url.clone();
        session.poll_interval = self.poll_interval;
        session.waiting_policy = self.waiting_policy;
        session
    }
}

/// Reads `name`, treating a set-but-blank variable as a configuration error.
fn non_empty(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue(
            name.to_string(),
            "value is empty".to_string(),
        )),
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}
