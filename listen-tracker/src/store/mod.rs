//! Remote play store
//!
//! The tracker's only durable boundary: one logical table of play sessions
//! with upsert-by-session and update-by-session. SQLite backs the real
//! store; the in-memory store serves tests.

mod memory;
mod sqlite;

pub use memory::MemoryPlayStore;
pub use sqlite::SqlitePlayStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listen_common::db::{PlayRow, PlayUpdate};

#[async_trait]
pub trait PlayStore: Send + Sync {
    /// Insert the row, or overwrite the row already stored for its session
    async fn upsert_play(&self, row: &PlayRow) -> Result<()>;

    /// Update a session's metric columns; returns the number of rows touched
    async fn update_play(&self, session_id: &str, update: &PlayUpdate) -> Result<u64>;

    /// Plays of a track started within `[from, to]`, oldest first
    async fn plays_for_track(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayRow>>;
}
