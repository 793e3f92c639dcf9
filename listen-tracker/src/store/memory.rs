use super::PlayStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listen_common::db::{PlayRow, PlayUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Play store held in memory, keyed by session id
///
/// `fail_next` makes the next writes fail, for exercising best-effort paths.
#[derive(Debug, Default)]
pub struct MemoryPlayStore {
    rows: Mutex<HashMap<String, PlayRow>>,
    failures_pending: AtomicU32,
}

impl MemoryPlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes (upserts or updates)
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    pub async fn get(&self, session_id: &str) -> Option<PlayRow> {
        self.rows.lock().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    fn take_failure(&self) -> Result<()> {
        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::Store("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlayStore for MemoryPlayStore {
    async fn upsert_play(&self, row: &PlayRow) -> Result<()> {
        self.take_failure()?;
        self.rows.lock().await.insert(row.session_id.clone(), row.clone());
        Ok(())
    }

    async fn update_play(&self, session_id: &str, update: &PlayUpdate) -> Result<u64> {
        self.take_failure()?;
        let mut rows = self.rows.lock().await;
        match rows.get_mut(session_id) {
            Some(row) => {
                row.apply(update);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn plays_for_track(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayRow>> {
        let rows = self.rows.lock().await;
        let mut plays: Vec<PlayRow> = rows
            .values()
            .filter(|r| r.shareable_track_id == track_id)
            .filter(|r| r.started_at >= from && r.started_at <= to)
            .cloned()
            .collect();
        plays.sort_by_key(|r| r.started_at);
        Ok(plays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(session_id: &str, pause_count: i64) -> PlayRow {
        let now = Utc::now();
        PlayRow {
            shareable_track_id: "track-1".to_string(),
            share_code: "code1234".to_string(),
            session_id: session_id.to_string(),
            device_type: None,
            browser: None,
            os: None,
            referrer_url: None,
            listener_country: None,
            listener_city: None,
            started_at: now,
            ended_at: None,
            seek_count: 0,
            pause_count,
            play_count: 1,
            listen_duration_ms: 0,
            max_position_reached_ms: 0,
            completion_percentage: 0.0,
            completed: false,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_session() {
        let store = MemoryPlayStore::new();
        store.upsert_play(&row("s1", 1)).await.unwrap();
        store.upsert_play(&row("s1", 2)).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("s1").await.unwrap().pause_count, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_session_touches_nothing() {
        let store = MemoryPlayStore::new();
        let update = PlayUpdate {
            listen_duration_ms: 1,
            max_position_reached_ms: 1,
            completion_percentage: 1.0,
            seek_count: 0,
            pause_count: 0,
            play_count: 1,
            completed: None,
            ended_at: None,
            updated_at: Utc::now(),
        };
        assert_eq!(store.update_play("nope", &update).await.unwrap(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryPlayStore::new();
        store.fail_next(1);
        assert!(store.upsert_play(&row("s1", 0)).await.is_err());
        assert!(store.upsert_play(&row("s1", 0)).await.is_ok());
        assert_eq!(store.len().await, 1);
    }
}
