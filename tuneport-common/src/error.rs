//! Common error types for tuneport

use thiserror::Error;

/// Common result type for tuneport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across tuneport crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file could not be parsed
    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
