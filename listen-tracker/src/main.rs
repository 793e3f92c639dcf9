//! Listen Tracker (listen-tracker) - Main entry point
//!
//! Publishes tracks under share codes, simulates listeners following a
//! script while recording their sessions, and reports per-track analytics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listen_common::db::init_database;
use listen_tracker::analytics::{track_analytics, DateRange, DEFAULT_RANGE_DAYS};
use listen_tracker::config::Config;
use listen_tracker::db::tracks::{self, NewTrack};
use listen_tracker::device::classify;
use listen_tracker::geo::{locator_from_config, GeoLocator};
use listen_tracker::lifecycle::{LifecycleRecorder, SessionContext};
use listen_tracker::media::{media_event_channel, SimulatedMedia};
use listen_tracker::script::ListenScript;
use listen_tracker::sender::spawn_writer;
use listen_tracker::session::{resolve_session_id, FileStore, KeyValueStore};
use listen_tracker::store::{PlayStore, SqlitePlayStore};
use listen_tracker::ListenTracker;

/// User agent reported when none is given
const DEFAULT_USER_AGENT: &str = "listen-tracker/0.1 (X11; Linux x86_64)";

/// Command-line arguments for listen-tracker
#[derive(Parser, Debug)]
#[command(name = "listen-tracker")]
#[command(about = "Listen analytics for shared tracks")]
#[command(version)]
struct Args {
    /// Root folder holding the database and listener profile
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a track under a new share code
    AddTrack(AddTrackArgs),
    /// Listen to a shared track, recording the session
    Listen(ListenArgs),
    /// Show analytics for a shared track
    Analytics(AnalyticsArgs),
    /// Re-enable a deactivated share link
    Activate { share_code: String },
    /// Stop a share link from accepting listens
    Deactivate { share_code: String },
}

#[derive(ClapArgs, Debug)]
struct AddTrackArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    artist: String,
    #[arg(long)]
    album: Option<String>,
    #[arg(long)]
    audio_url: String,
    #[arg(long)]
    duration_ms: Option<i64>,
    #[arg(long)]
    max_plays: Option<i64>,
    /// RFC 3339 timestamp after which the link stops working
    #[arg(long)]
    expires_at: Option<DateTime<Utc>>,
    #[arg(long)]
    private: bool,
}

#[derive(ClapArgs, Debug)]
struct ListenArgs {
    share_code: String,
    /// Listen script (TOML); plays the whole track when omitted
    #[arg(long)]
    script: Option<PathBuf>,
    /// Duration to simulate when the track has none recorded
    #[arg(long)]
    duration_ms: Option<u64>,
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
    #[arg(long)]
    referrer: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct AnalyticsArgs {
    share_code: String,
    /// Days back from now to include
    #[arg(long, default_value_t = DEFAULT_RANGE_DAYS)]
    days: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Loading logs nothing, so it can run before the subscriber picks up log_level
    let config = Config::load(args.config.as_deref(), args.root_folder.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.db_path.display());

    match args.command {
        Command::AddTrack(add) => add_track(&config, add).await,
        Command::Listen(listen_args) => listen(&config, listen_args).await,
        Command::Analytics(analytics_args) => analytics(&config, analytics_args).await,
        Command::Activate { share_code } => set_active(&config, &share_code, true).await,
        Command::Deactivate { share_code } => set_active(&config, &share_code, false).await,
    }
}

async fn add_track(config: &Config, args: AddTrackArgs) -> Result<()> {
    let db = init_database(&config.db_path)
        .await
        .context("Failed to open database")?;

    let track = tracks::create_track(
        &db,
        &NewTrack {
            track_name: args.name,
            artist_name: args.artist,
            album_name: args.album,
            audio_file_url: args.audio_url,
            duration_ms: args.duration_ms,
            is_public: !args.private,
            max_plays: args.max_plays,
            expires_at: args.expires_at,
            ..Default::default()
        },
    )
    .await
    .context("Failed to publish track")?;

    println!("{}", track.share_code);
    Ok(())
}

async fn listen(config: &Config, args: ListenArgs) -> Result<()> {
    let db = init_database(&config.db_path)
        .await
        .context("Failed to open database")?;
    let track = tracks::get_track_by_code(&db, &args.share_code)
        .await
        .with_context(|| format!("Cannot listen to {}", args.share_code))?;

    let duration_ms = match track.duration_ms.and_then(|d| u64::try_from(d).ok()) {
        Some(d) if d > 0 => d,
        _ => match args.duration_ms {
            Some(d) if d > 0 => d,
            _ => bail!("Track {} has no duration; pass --duration-ms", track.share_code),
        },
    };

    let script = match &args.script {
        Some(path) => ListenScript::load(path)
            .with_context(|| format!("Failed to load script {}", path.display()))?,
        None => ListenScript::play_through(duration_ms),
    };

    // Session identity lives in the listener profile
    let profile: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.profile_path));
    let key = config.tracker.session_scope.storage_key(&track.share_code);
    let session_id = resolve_session_id(profile.as_ref(), &key);

    let recorder = LifecycleRecorder::new(
        SessionContext {
            session_id,
            track_id: track.id.clone(),
            share_code: track.share_code.clone(),
            duration_ms: Some(duration_ms),
            device: classify(&args.user_agent),
            referrer_url: args.referrer,
        },
        config.tracker.completion_threshold_pct,
    );

    let store: Arc<dyn PlayStore> = Arc::new(SqlitePlayStore::new(db));
    let locator: Arc<dyn GeoLocator> = Arc::from(
        locator_from_config(&config.tracker.geolocation)
            .context("Failed to create geolocation client")?,
    );
    let (sender, writer) = spawn_writer(store, locator);

    let tracker = ListenTracker::new(recorder, &config.tracker, sender, Some(profile));
    let (events_tx, events_rx) = media_event_channel();
    let handle = tracker.spawn(events_rx);
    let media = SimulatedMedia::spawn(duration_ms, events_tx);

    info!(
        session_id = %handle.session_id(),
        share_code = %track.share_code,
        track = %track.track_name,
        planned_ms = script.total_wait().as_millis() as u64,
        "Listening"
    );
    script.run(media.as_ref()).await;

    let summary = handle.unmount().await.context("Tracker failed")?;
    drop(media);

    // The tracker held the last write sender, so the writer drains and stops
    let stats = writer.await.context("Play writer failed")?;
    if stats.failed > 0 || stats.missing > 0 {
        warn!(
            failed = stats.failed,
            missing = stats.missing,
            "Some play writes were not recorded"
        );
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn analytics(config: &Config, args: AnalyticsArgs) -> Result<()> {
    let db = init_database(&config.db_path)
        .await
        .context("Failed to open database")?;
    let Some(track) = tracks::get_track_row(&db, &args.share_code).await? else {
        bail!("No track with share code {}", args.share_code);
    };

    let range = DateRange::last_days(args.days).context("Invalid --days")?;
    let store = SqlitePlayStore::new(db);
    let report = track_analytics(&store, &track.id, range)
        .await
        .context("Failed to compute analytics")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn set_active(config: &Config, share_code: &str, is_active: bool) -> Result<()> {
    let db = init_database(&config.db_path)
        .await
        .context("Failed to open database")?;
    let Some(track) = tracks::get_track_row(&db, share_code).await? else {
        bail!("No track with share code {}", share_code);
    };

    tracks::set_track_active(&db, &track.id, is_active)
        .await
        .with_context(|| format!("Failed to update {}", share_code))?;
    info!(share_code, is_active, "Share link updated");
    Ok(())
}
