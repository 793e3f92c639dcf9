//! Per-track listen analytics
//!
//! Aggregates play rows over a date range into totals and breakdowns by
//! country, device, referrer and day.

use crate::error::{Error, Result};
use crate::store::PlayStore;
use chrono::{DateTime, Utc};
use listen_common::db::PlayRow;
use listen_common::time;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Range used when the caller gives none
pub const DEFAULT_RANGE_DAYS: i64 = 30;

/// Entries kept in each top-N breakdown
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(Error::BadRequest(format!("range start {} is after end {}", from, to)));
        }
        Ok(Self { from, to })
    }

    /// The last `days` days up to now; `days` must not be negative
    pub fn last_days(days: i64) -> Result<Self> {
        if days < 0 {
            return Err(Error::BadRequest(format!("day count must not be negative, got {}", days)));
        }
        let to = time::now();
        Self::new(time::days_before(to, days), to)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        let to = time::now();
        Self {
            from: time::days_before(to, DEFAULT_RANGE_DAYS),
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub plays: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: String,
    pub plays: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackAnalytics {
    pub total_plays: u64,
    /// Distinct sessions
    pub unique_listeners: u64,
    pub total_listen_time_ms: u64,
    pub avg_listen_time_ms: u64,
    /// Percentage of sessions marked completed
    pub completion_rate: f64,
    pub total_completes: u64,
    pub top_countries: Vec<LabelCount>,
    pub top_devices: Vec<LabelCount>,
    pub top_referrers: Vec<LabelCount>,
    pub plays_by_day: Vec<DayCount>,
}

/// Aggregate already-fetched play rows
pub fn summarize(plays: &[PlayRow]) -> TrackAnalytics {
    if plays.is_empty() {
        return TrackAnalytics::default();
    }

    let sessions = plays.len() as u64;
    let total_plays: u64 = plays.iter().map(|p| p.play_count.max(0) as u64).sum();
    let unique_listeners = plays
        .iter()
        .map(|p| p.session_id.as_str())
        .collect::<BTreeSet<_>>()
        .len() as u64;
    let total_listen_time_ms: u64 = plays
        .iter()
        .map(|p| p.listen_duration_ms.max(0) as u64)
        .sum();
    let total_completes = plays.iter().filter(|p| p.completed).count() as u64;

    let mut by_day: BTreeMap<String, u64> = BTreeMap::new();
    for play in plays {
        *by_day.entry(time::day_key(&play.started_at)).or_default() += 1;
    }

    TrackAnalytics {
        total_plays,
        unique_listeners,
        total_listen_time_ms,
        avg_listen_time_ms: total_listen_time_ms / sessions,
        completion_rate: total_completes as f64 / sessions as f64 * 100.0,
        total_completes,
        top_countries: top_counts(plays.iter().map(|p| p.listener_country.as_deref())),
        top_devices: top_counts(plays.iter().map(|p| p.device_type.as_deref())),
        top_referrers: top_counts(plays.iter().map(|p| p.referrer_url.as_deref())),
        plays_by_day: by_day
            .into_iter()
            .map(|(date, plays)| DayCount { date, plays })
            .collect(),
    }
}

/// Most frequent non-empty labels, ties broken alphabetically
fn top_counts<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Vec<LabelCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for label in labels.flatten().filter(|l| !l.is_empty()) {
        *counts.entry(label).or_default() += 1;
    }

    let mut counts: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, plays)| LabelCount {
            label: label.to_string(),
            plays,
        })
        .collect();
    counts.sort_by(|a, b| b.plays.cmp(&a.plays).then_with(|| a.label.cmp(&b.label)));
    counts.truncate(TOP_N);
    counts
}

/// Fetch a track's plays in `range` and aggregate them
pub async fn track_analytics(
    store: &dyn PlayStore,
    track_id: &str,
    range: DateRange,
) -> Result<TrackAnalytics> {
    let plays = store.plays_for_track(track_id, range.from, range.to).await?;
    Ok(summarize(&plays))
}
