//! Play session queries
//!
//! Rows in `shareable_track_plays` are keyed by `session_id`: inserts go
//! through an upsert so repeated starts for one session overwrite the row.

use crate::error::Result;
use chrono::{DateTime, Utc};
use listen_common::db::{PlayRow, PlayUpdate};
use sqlx::{Pool, Sqlite};

const PLAY_COLUMNS: &str = "shareable_track_id, share_code, session_id, device_type, browser, os, \
     referrer_url, listener_country, listener_city, started_at, ended_at, seek_count, \
     pause_count, play_count, listen_duration_ms, max_position_reached_ms, \
     completion_percentage, completed, updated_at";

/// Insert a play row, or overwrite the existing row for its session
pub async fn upsert_play(db: &Pool<Sqlite>, row: &PlayRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shareable_track_plays (
            shareable_track_id, share_code, session_id, device_type, browser, os,
            referrer_url, listener_country, listener_city, started_at, ended_at,
            seek_count, pause_count, play_count, listen_duration_ms,
            max_position_reached_ms, completion_percentage, completed, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            shareable_track_id = excluded.shareable_track_id,
            share_code = excluded.share_code,
            device_type = excluded.device_type,
            browser = excluded.browser,
            os = excluded.os,
            referrer_url = excluded.referrer_url,
            listener_country = excluded.listener_country,
            listener_city = excluded.listener_city,
            started_at = excluded.started_at,
            ended_at = excluded.ended_at,
            seek_count = excluded.seek_count,
            pause_count = excluded.pause_count,
            play_count = excluded.play_count,
            listen_duration_ms = excluded.listen_duration_ms,
            max_position_reached_ms = excluded.max_position_reached_ms,
            completion_percentage = excluded.completion_percentage,
            completed = excluded.completed,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.shareable_track_id)
    .bind(&row.share_code)
    .bind(&row.session_id)
    .bind(&row.device_type)
    .bind(&row.browser)
    .bind(&row.os)
    .bind(&row.referrer_url)
    .bind(&row.listener_country)
    .bind(&row.listener_city)
    .bind(row.started_at)
    .bind(row.ended_at)
    .bind(row.seek_count)
    .bind(row.pause_count)
    .bind(row.play_count)
    .bind(row.listen_duration_ms)
    .bind(row.max_position_reached_ms)
    .bind(row.completion_percentage)
    .bind(row.completed)
    .bind(row.updated_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Update the metric columns of a session's row
///
/// `completed` and `ended_at` are left untouched when `None`.
///
/// # Returns
/// Number of rows updated (0 when the session has no row yet)
pub async fn update_play(db: &Pool<Sqlite>, session_id: &str, update: &PlayUpdate) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE shareable_track_plays SET
            listen_duration_ms = ?,
            max_position_reached_ms = ?,
            completion_percentage = ?,
            seek_count = ?,
            pause_count = ?,
            play_count = ?,
            completed = COALESCE(?, completed),
            ended_at = COALESCE(?, ended_at),
            updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(update.listen_duration_ms)
    .bind(update.max_position_reached_ms)
    .bind(update.completion_percentage)
    .bind(update.seek_count)
    .bind(update.pause_count)
    .bind(update.play_count)
    .bind(update.completed)
    .bind(update.ended_at)
    .bind(update.updated_at)
    .bind(session_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get_play(db: &Pool<Sqlite>, session_id: &str) -> Result<Option<PlayRow>> {
    let sql = format!("SELECT {} FROM shareable_track_plays WHERE session_id = ?", PLAY_COLUMNS);
    let row = sqlx::query_as::<_, PlayRow>(&sql)
        .bind(session_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Plays of a track started within `[from, to]`, oldest first
pub async fn plays_for_track(
    db: &Pool<Sqlite>,
    track_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<PlayRow>> {
    let sql = format!(
        "SELECT {} FROM shareable_track_plays
         WHERE shareable_track_id = ? AND started_at >= ? AND started_at <= ?
         ORDER BY started_at",
        PLAY_COLUMNS
    );
    let rows = sqlx::query_as::<_, PlayRow>(&sql)
        .bind(track_id)
        .bind(from)
        .bind(to)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Total number of play sessions recorded for a track
pub async fn count_plays(db: &Pool<Sqlite>, track_id: &str) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shareable_track_plays WHERE shareable_track_id = ?")
            .bind(track_id)
            .fetch_one(db)
            .await?;
    Ok(count)
}
