//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every statement is idempotent, so opening an existing database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets analytics reads run alongside the play writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// A single connection is used so every query sees the same memory database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_shareable_tracks_table(pool).await?;
    create_shareable_track_plays_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the shareable_tracks table
///
/// One row per published track; `share_code` is the public lookup key.
pub async fn create_shareable_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shareable_tracks (
            id TEXT PRIMARY KEY,
            track_name TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            album_name TEXT,
            audio_file_url TEXT NOT NULL,
            duration_ms INTEGER CHECK (duration_ms IS NULL OR duration_ms >= 0),
            share_code TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_public INTEGER NOT NULL DEFAULT 1,
            max_plays INTEGER CHECK (max_plays IS NULL OR max_plays > 0),
            expires_at TIMESTAMP,
            description TEXT,
            genre TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the shareable_track_plays table
///
/// `session_id` is unique: it is the conflict key for play upserts.
pub async fn create_shareable_track_plays_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shareable_track_plays (
            session_id TEXT PRIMARY KEY,
            shareable_track_id TEXT NOT NULL REFERENCES shareable_tracks(id) ON DELETE CASCADE,
            share_code TEXT NOT NULL,
            device_type TEXT,
            browser TEXT,
            os TEXT,
            referrer_url TEXT,
            listener_country TEXT,
            listener_city TEXT,
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP,
            seek_count INTEGER NOT NULL DEFAULT 0,
            pause_count INTEGER NOT NULL DEFAULT 0,
            play_count INTEGER NOT NULL DEFAULT 1,
            listen_duration_ms INTEGER NOT NULL DEFAULT 0,
            max_position_reached_ms INTEGER NOT NULL DEFAULT 0,
            completion_percentage REAL NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_track_plays_track_started
         ON shareable_track_plays(shareable_track_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
