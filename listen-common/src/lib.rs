//! # Listen Common Library
//!
//! Shared code for the listen tracker workspace:
//! - Database initialization and play/track row models
//! - Configuration loading and root folder resolution
//! - Common error type
//! - Timestamp and UUID helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
