//! Database access layer
//!
//! Queries for shareable tracks and their play sessions.

pub mod plays;
pub mod tracks;
