//! Listen metrics accumulator
//!
//! An explicit state machine fed by media events. Every transition takes the
//! current monotonic time in milliseconds, so the fold arithmetic is plain
//! and testable without a clock.
//!
//! Listen time only accumulates between a resume and the next fold. The
//! furthest position reached is a high-water mark: seeking backward never
//! lowers it.

use serde::{Deserialize, Serialize};

/// Counters and timing for one listen session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsAccumulator {
    accumulated_ms: u64,
    /// Monotonic time accumulation last resumed; `None` while not playing
    #[serde(skip)]
    last_resume_at: Option<u64>,
    max_position_ms: u64,
    seek_count: u32,
    pause_count: u32,
    play_recorded: bool,
}

/// Point-in-time copy of the accumulator ready to be written
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub listen_duration_ms: u64,
    pub max_position_reached_ms: u64,
    pub completion_percentage: f64,
    pub seek_count: u32,
    pub pause_count: u32,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback started or resumed
    ///
    /// Returns `true` for the first play of the session, which is when the
    /// session start must be recorded.
    pub fn on_play(&mut self, now_ms: u64) -> bool {
        let first_play = !self.play_recorded;
        self.play_recorded = true;
        if self.last_resume_at.is_none() {
            self.last_resume_at = Some(now_ms);
        }
        first_play
    }

    pub fn on_time_update(&mut self, position_ms: u64) {
        if position_ms > self.max_position_ms {
            self.max_position_ms = position_ms;
        }
    }

    pub fn on_pause(&mut self, now_ms: u64) {
        self.pause_count += 1;
        self.suspend(now_ms);
    }

    /// Seeks are counted only; the high-water mark moves on the following
    /// time updates
    pub fn on_seeking(&mut self) {
        self.seek_count += 1;
    }

    pub fn on_ended(&mut self, now_ms: u64) {
        self.suspend(now_ms);
    }

    /// Fold elapsed listen time and keep accumulating from `now_ms`
    pub fn fold(&mut self, now_ms: u64) {
        if let Some(resumed_at) = self.last_resume_at {
            self.accumulated_ms += now_ms.saturating_sub(resumed_at);
            self.last_resume_at = Some(now_ms);
        }
    }

    /// Fold elapsed listen time and stop accumulating
    pub fn suspend(&mut self, now_ms: u64) {
        self.fold(now_ms);
        self.last_resume_at = None;
    }

    pub fn is_accumulating(&self) -> bool {
        self.last_resume_at.is_some()
    }

    pub fn play_recorded(&self) -> bool {
        self.play_recorded
    }

    pub fn accumulated_ms(&self) -> u64 {
        self.accumulated_ms
    }

    pub fn max_position_ms(&self) -> u64 {
        self.max_position_ms
    }

    pub fn seek_count(&self) -> u32 {
        self.seek_count
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_count
    }

    /// Current values with completion computed against `duration_ms`
    pub fn snapshot(&self, duration_ms: Option<u64>) -> MetricsSnapshot {
        MetricsSnapshot {
            listen_duration_ms: self.accumulated_ms,
            max_position_reached_ms: self.max_position_ms,
            completion_percentage: completion_percentage(self.max_position_ms, duration_ms),
            seek_count: self.seek_count,
            pause_count: self.pause_count,
        }
    }
}

/// Furthest position as a percentage of the duration, 0 when unknown
pub fn completion_percentage(max_position_ms: u64, duration_ms: Option<u64>) -> f64 {
    match duration_ms {
        Some(duration) if duration > 0 => {
            (max_position_ms as f64 / duration as f64 * 100.0).min(100.0)
        }
        _ => 0.0,
    }
}

/// A session is complete when playback ended or the threshold was reached
pub fn is_completed(ended: bool, completion_percentage: f64, threshold_pct: f64) -> bool {
    ended || completion_percentage >= threshold_pct
}
