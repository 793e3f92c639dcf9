//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A track published under a share code
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareableTrack {
    pub id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub audio_file_url: String,
    pub duration_ms: Option<i64>,
    pub share_code: String,
    pub is_active: bool,
    pub is_public: bool,
    /// Play limit; `None` means unlimited
    pub max_plays: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One listen session row in `shareable_track_plays`
///
/// `session_id` is unique; writes for the same session overwrite the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayRow {
    pub shareable_track_id: String,
    pub share_code: String,
    pub session_id: String,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer_url: Option<String>,
    pub listener_country: Option<String>,
    pub listener_city: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub seek_count: i64,
    pub pause_count: i64,
    pub play_count: i64,
    pub listen_duration_ms: i64,
    pub max_position_reached_ms: i64,
    pub completion_percentage: f64,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl PlayRow {
    /// Apply a partial update the way the store's update-by-session does
    ///
    /// `completed` and `ended_at` are only overwritten when present.
    pub fn apply(&mut self, update: &PlayUpdate) {
        self.listen_duration_ms = update.listen_duration_ms;
        self.max_position_reached_ms = update.max_position_reached_ms;
        self.completion_percentage = update.completion_percentage;
        self.seek_count = update.seek_count;
        self.pause_count = update.pause_count;
        self.play_count = update.play_count;
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(ended_at) = update.ended_at {
            self.ended_at = Some(ended_at);
        }
        self.updated_at = update.updated_at;
    }
}

/// Metric fields written by update-by-session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayUpdate {
    pub listen_duration_ms: i64,
    pub max_position_reached_ms: i64,
    pub completion_percentage: f64,
    pub seek_count: i64,
    pub pause_count: i64,
    pub play_count: i64,
    pub completed: Option<bool>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PlayRow {
        let now = Utc::now();
        PlayRow {
            shareable_track_id: "track-1".to_string(),
            share_code: "abcd1234".to_string(),
            session_id: "session-1".to_string(),
            device_type: Some("desktop".to_string()),
            browser: None,
            os: None,
            referrer_url: None,
            listener_country: None,
            listener_city: None,
            started_at: now,
            ended_at: None,
            seek_count: 0,
            pause_count: 0,
            play_count: 1,
            listen_duration_ms: 0,
            max_position_reached_ms: 0,
            completion_percentage: 0.0,
            completed: false,
            updated_at: now,
        }
    }

    fn update(completed: Option<bool>) -> PlayUpdate {
        PlayUpdate {
            listen_duration_ms: 12_000,
            max_position_reached_ms: 30_000,
            completion_percentage: 50.0,
            seek_count: 2,
            pause_count: 1,
            play_count: 1,
            completed,
            ended_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_overwrites_metrics() {
        let mut row = row();
        row.apply(&update(None));
        assert_eq!(row.listen_duration_ms, 12_000);
        assert_eq!(row.max_position_reached_ms, 30_000);
        assert_eq!(row.seek_count, 2);
        assert_eq!(row.pause_count, 1);
        assert!(!row.completed);
        assert!(row.ended_at.is_none());
    }

    #[test]
    fn test_apply_keeps_completed_when_absent() {
        let mut row = row();
        row.apply(&update(Some(true)));
        row.apply(&update(None));
        assert!(row.completed);
    }
}
