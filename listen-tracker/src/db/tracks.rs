//! Shareable track queries
//!
//! Tracks are published under a short random share code. Public lookup by
//! code refuses tracks that are inactive, expired or out of plays.

use crate::db::plays;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use listen_common::db::ShareableTrack;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Length of generated share codes
pub const SHARE_CODE_LEN: usize = 8;

/// Attempts at finding an unused share code before giving up
const SHARE_CODE_ATTEMPTS: usize = 5;

const TRACK_COLUMNS: &str = "id, track_name, artist_name, album_name, audio_file_url, duration_ms, \
     share_code, is_active, is_public, max_plays, expires_at, description, genre, \
     created_at, updated_at";

/// Fields supplied when publishing a track
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub audio_file_url: String,
    pub duration_ms: Option<i64>,
    pub is_public: bool,
    pub max_plays: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub genre: Option<String>,
}

/// Random lowercase alphanumeric share code
pub fn generate_share_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Publish a track under a freshly generated share code
pub async fn create_track(db: &Pool<Sqlite>, new: &NewTrack) -> Result<ShareableTrack> {
    if new.track_name.trim().is_empty() || new.artist_name.trim().is_empty() {
        return Err(Error::BadRequest("track and artist name are required".to_string()));
    }
    if new.audio_file_url.trim().is_empty() {
        return Err(Error::BadRequest("audio file URL is required".to_string()));
    }
    if matches!(new.max_plays, Some(n) if n <= 0) {
        return Err(Error::BadRequest("max_plays must be positive".to_string()));
    }

    let mut share_code = generate_share_code();
    let mut attempts = 1;
    while get_track_row(db, &share_code).await?.is_some() {
        if attempts >= SHARE_CODE_ATTEMPTS {
            return Err(Error::Internal("could not allocate a unique share code".to_string()));
        }
        warn!("Share code collision on {}, retrying", share_code);
        share_code = generate_share_code();
        attempts += 1;
    }

    let now = Utc::now();
    let track = ShareableTrack {
        id: listen_common::uuid_utils::generate_string(),
        track_name: new.track_name.clone(),
        artist_name: new.artist_name.clone(),
        album_name: new.album_name.clone(),
        audio_file_url: new.audio_file_url.clone(),
        duration_ms: new.duration_ms,
        share_code,
        is_active: true,
        is_public: new.is_public,
        max_plays: new.max_plays,
        expires_at: new.expires_at,
        description: new.description.clone(),
        genre: new.genre.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO shareable_tracks (
            id, track_name, artist_name, album_name, audio_file_url, duration_ms,
            share_code, is_active, is_public, max_plays, expires_at, description,
            genre, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&track.id)
    .bind(&track.track_name)
    .bind(&track.artist_name)
    .bind(&track.album_name)
    .bind(&track.audio_file_url)
    .bind(track.duration_ms)
    .bind(&track.share_code)
    .bind(track.is_active)
    .bind(track.is_public)
    .bind(track.max_plays)
    .bind(track.expires_at)
    .bind(&track.description)
    .bind(&track.genre)
    .bind(track.created_at)
    .bind(track.updated_at)
    .execute(db)
    .await?;

    info!(track_id = %track.id, share_code = %track.share_code, "Published shareable track");
    Ok(track)
}

/// Raw lookup by share code, without availability checks
pub async fn get_track_row(db: &Pool<Sqlite>, share_code: &str) -> Result<Option<ShareableTrack>> {
    let sql = format!("SELECT {} FROM shareable_tracks WHERE share_code = ?", TRACK_COLUMNS);
    let track = sqlx::query_as::<_, ShareableTrack>(&sql)
        .bind(share_code)
        .fetch_optional(db)
        .await?;
    Ok(track)
}

/// Public lookup used by the listen flow
///
/// Fails with `TrackNotFound` for unknown codes and `TrackUnavailable` for
/// inactive tracks, expired tracks and tracks that reached `max_plays`.
pub async fn get_track_by_code(db: &Pool<Sqlite>, share_code: &str) -> Result<ShareableTrack> {
    let track = get_track_row(db, share_code)
        .await?
        .ok_or_else(|| Error::TrackNotFound(share_code.to_string()))?;

    if !track.is_active {
        return Err(Error::TrackUnavailable(format!("{} is not active", share_code)));
    }
    if matches!(track.expires_at, Some(expires_at) if expires_at <= Utc::now()) {
        return Err(Error::TrackUnavailable(format!("{} has expired", share_code)));
    }
    if let Some(max_plays) = track.max_plays {
        let played = plays::count_plays(db, &track.id).await?;
        if played >= max_plays {
            return Err(Error::TrackUnavailable(format!(
                "{} reached its play limit of {}",
                share_code, max_plays
            )));
        }
    }

    Ok(track)
}

pub async fn set_track_active(db: &Pool<Sqlite>, track_id: &str, is_active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE shareable_tracks SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(Utc::now())
        .bind(track_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::TrackNotFound(track_id.to_string()));
    }
    Ok(())
}
