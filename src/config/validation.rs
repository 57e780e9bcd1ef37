//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (queue capacity, connection caps, status codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::DispatcherConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("queue.capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("pool.max_connections_per_host must be greater than zero")]
    ZeroConnectionsPerHost,

    #[error("dispatch.error_status_codes contains invalid status {0}")]
    InvalidStatusCode(u16),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.queue.capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if config.pool.max_connections_per_host == 0 {
        errors.push(ValidationError::ZeroConnectionsPerHost);
    }
    for &code in &config.dispatch.error_status_codes {
        if !(100..=599).contains(&code) {
            errors.push(ValidationError::InvalidStatusCode(code));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
