//! # PlateStack Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] wrapping each subsystem error, so callers
//! that drive several subsystems (the CLI, embedding servers) can use a single
//! `Result` type and still match on the typed cause.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::ConfigError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::version::VersionError;

/// Top-level error type for PlateStack
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Invalid version, range, relation or metadata value
    #[error("Validation error: {0}")]
    Validation(#[from] VersionError),

    /// Loader configuration could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
