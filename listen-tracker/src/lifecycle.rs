//! Session lifecycle records
//!
//! Builds the rows written when a session starts, while it plays, and when
//! it ends. Building is pure; sending is the write sender's job.

use crate::device::DeviceInfo;
use crate::metrics::{is_completed, MetricsSnapshot};
use chrono::{DateTime, Utc};
use listen_common::db::{PlayRow, PlayUpdate};

/// Each row stands for exactly one play
const PLAY_COUNT: i64 = 1;

/// Identity of one listen session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub track_id: String,
    pub share_code: String,
    /// Track duration from the catalog, used until metadata reports one
    pub duration_ms: Option<u64>,
    pub device: DeviceInfo,
    pub referrer_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LifecycleRecorder {
    context: SessionContext,
    completion_threshold_pct: f64,
}

impl LifecycleRecorder {
    pub fn new(context: SessionContext, completion_threshold_pct: f64) -> Self {
        Self {
            context,
            completion_threshold_pct,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    /// Row upserted on the first play: identity, device, zeroed counters
    ///
    /// Location fields are left empty; the writer fills them best-effort.
    pub fn start_row(&self, started_at: DateTime<Utc>) -> PlayRow {
        PlayRow {
            shareable_track_id: self.context.track_id.clone(),
            share_code: self.context.share_code.clone(),
            session_id: self.context.session_id.clone(),
            device_type: Some(self.context.device.device_type.clone()),
            browser: Some(self.context.device.browser.clone()),
            os: Some(self.context.device.os.clone()),
            referrer_url: self.context.referrer_url.clone(),
            listener_country: None,
            listener_city: None,
            started_at,
            ended_at: None,
            seek_count: 0,
            pause_count: 0,
            play_count: PLAY_COUNT,
            listen_duration_ms: 0,
            max_position_reached_ms: 0,
            completion_percentage: 0.0,
            completed: false,
            updated_at: started_at,
        }
    }

    /// Periodic or pause-triggered metrics update
    pub fn metrics_update(&self, snapshot: &MetricsSnapshot, at: DateTime<Utc>) -> PlayUpdate {
        self.update(snapshot, None, None, at)
    }

    /// Final update: end timestamp plus completion
    ///
    /// `ended` is true when playback reached the end; reaching the completion
    /// threshold also marks the session completed.
    pub fn end_update(&self, snapshot: &MetricsSnapshot, ended: bool, at: DateTime<Utc>) -> PlayUpdate {
        let completed = is_completed(
            ended,
            snapshot.completion_percentage,
            self.completion_threshold_pct,
        );
        self.update(snapshot, Some(completed), Some(at), at)
    }

    fn update(
        &self,
        snapshot: &MetricsSnapshot,
        completed: Option<bool>,
        ended_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> PlayUpdate {
        PlayUpdate {
            listen_duration_ms: snapshot.listen_duration_ms as i64,
            max_position_reached_ms: snapshot.max_position_reached_ms as i64,
            completion_percentage: snapshot.completion_percentage,
            seek_count: i64::from(snapshot.seek_count),
            pause_count: i64::from(snapshot.pause_count),
            play_count: PLAY_COUNT,
            completed,
            ended_at,
            updated_at: at,
        }
    }
}
