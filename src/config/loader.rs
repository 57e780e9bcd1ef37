//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::DispatcherConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const MAX_CONNECTION_PER_HOST: &str = "MAX_CONNECTION_PER_HOST";
pub const MAX_IDLE_CONNECTION_PER_HOST: &str = "MAX_IDLE_CONNECTION_PER_HOST";
pub const DISPATCH_TIMEOUT_SECS: &str = "DISPATCH_TIMEOUT_SECS";
pub const DISPATCH_QUEUE_CAPACITY: &str = "DISPATCH_QUEUE_CAPACITY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied after parsing, before validation.
pub fn load_config(path: &Path) -> Result<DispatcherConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: DispatcherConfig = toml::from_str(&content)?;
    config.apply_env_overrides();

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl DispatcherConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Read pool limits and the queue/timeout knobs from the environment.
    ///
    /// A variable that is absent or not an integer leaves the current value
    /// in place. So does `0` for the per-host limits and the queue capacity.
    /// [`DispatcherConfig::from_env`] therefore falls back to
    /// [`DEFAULT_CONNECTIONS_PER_HOST`](crate::config::schema::DEFAULT_CONNECTIONS_PER_HOST)
    /// for the per-host limits.
    pub fn apply_env_overrides(&mut self) {
        self.pool.max_connections_per_host = parse_nonzero_or(
            std::env::var(MAX_CONNECTION_PER_HOST).ok().as_deref(),
            self.pool.max_connections_per_host,
        );
        self.pool.max_idle_connections_per_host = parse_nonzero_or(
            std::env::var(MAX_IDLE_CONNECTION_PER_HOST).ok().as_deref(),
            self.pool.max_idle_connections_per_host,
        );
        self.timeouts.request_secs = parse_or(
            std::env::var(DISPATCH_TIMEOUT_SECS).ok().as_deref(),
            self.timeouts.request_secs,
        );
        self.queue.capacity = parse_nonzero_or(
            std::env::var(DISPATCH_QUEUE_CAPACITY).ok().as_deref(),
            self.queue.capacity,
        );
    }
}

/// Parse an optional setting, falling back on absence or a bad value.
fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    match value {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(value = %raw, "Ignoring unparsable setting, using default");
                default
            }
        },
        _ => default,
    }
}

/// Like [`parse_or`], but a zero is treated as unusable.
fn parse_nonzero_or(value: Option<&str>, default: usize) -> usize {
    match parse_or(value, default) {
        0 => {
            tracing::warn!(default, "Ignoring zero setting, using default");
            default
        }
        parsed => parsed,
    }
}
