//! # Listen Tracker Library (listen-tracker)
//!
//! Listen analytics for shared tracks.
//!
//! **Purpose:** Follow one listener's session on a shared track, accumulate
//! how much of it was actually heard, and persist start, periodic, and end
//! records to the play store without ever interrupting playback.
//!
//! **Architecture:** A media element raises events on a channel; a per-session
//! tracker task owns the metrics accumulator and hands best-effort writes to a
//! single writer task backed by SQLite.

pub mod analytics;
pub mod config;
pub mod db;
pub mod device;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod media;
pub mod metrics;
pub mod script;
pub mod sender;
pub mod session;
pub mod store;
pub mod tracker;

pub use error::{Error, Result};
pub use tracker::{ListenTracker, SessionSummary, TrackerHandle};
