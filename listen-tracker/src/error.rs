//! Error types for listen-tracker
//!
//! Analytics writes never surface these to the listener: the writer task logs
//! and drops them. They reach callers only from setup paths (config, track
//! lookup, database initialization) and from the stores themselves.

use thiserror::Error;

/// Main error type for the listen-tracker crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] listen_common::Error),

    /// Profile / script file I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of persisted local state
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse errors (config and listen scripts)
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Outbound HTTP errors (geolocation lookup)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote play store rejected or failed a write
    #[error("Store error: {0}")]
    Store(String),

    /// No track published under the share code
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Track exists but cannot be played (inactive, expired, play limit)
    #[error("Track unavailable: {0}")]
    TrackUnavailable(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using listen-tracker Error
pub type Result<T> = std::result::Result<T, Error>;
