//! Common error types for the listen tracker workspace

use thiserror::Error;

/// Common result type for shared operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the workspace crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error in a configuration file
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
