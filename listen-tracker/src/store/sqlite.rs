use super::PlayStore;
use crate::db::plays;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listen_common::db::{PlayRow, PlayUpdate};
use sqlx::SqlitePool;

/// Play store over the `shareable_track_plays` table
#[derive(Debug, Clone)]
pub struct SqlitePlayStore {
    db: SqlitePool,
}

impl SqlitePlayStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlayStore for SqlitePlayStore {
    async fn upsert_play(&self, row: &PlayRow) -> Result<()> {
        plays::upsert_play(&self.db, row).await
    }

    async fn update_play(&self, session_id: &str, update: &PlayUpdate) -> Result<u64> {
        plays::update_play(&self.db, session_id, update).await
    }

    async fn plays_for_track(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayRow>> {
        plays::plays_for_track(&self.db, track_id, from, to).await
    }
}
