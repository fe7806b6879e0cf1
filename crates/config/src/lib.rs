//! Certkeeper configuration
//!
//! Loads daemon configuration from the process environment and validates
//! it before any orchestration work starts. All options live in a single
//! immutable [`Settings`] struct that is threaded through every component;
//! nothing reads the environment after startup.
//!
//! # Example
//!
//! ```ignore
//! use certkeeper_config::Settings;
//!
//! let settings = Settings::from_env()?;
//! settings.validate()?;
//! ```

mod settings;
mod validate;

pub use settings::{DnsConfig, Settings};
pub use validate::ValidationError;

use thiserror::Error;

/// Errors raised while loading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The environment could not be deserialized into [`Settings`]
    #[error("failed to read configuration from environment: {0}")]
    Environment(#[from] envy::Error),

    /// A loaded value failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
