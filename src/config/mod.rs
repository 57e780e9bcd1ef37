//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (MAX_CONNECTION_PER_HOST, ...)
//!     → validation.rs (semantic checks)
//!     → DispatcherConfig (validated, immutable)
//!     → read once by Dispatcher construction
//! ```
//!
//! # Design Decisions
//! - Config is read once; a running dispatcher never observes changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DispatchConfig, DispatcherConfig, ObservabilityConfig, OverflowPolicy, PoolConfig,
    QueueConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
