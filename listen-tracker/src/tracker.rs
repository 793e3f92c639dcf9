//! Listen session tracker
//!
//! One task per session owns the metrics accumulator and reacts to three
//! sources: media events, the periodic flush interval, and unmount. Because
//! everything runs on that single task, event handling and flushing never
//! interleave.
//!
//! Writes:
//! - first `Play`: session start (upsert)
//! - every flush interval while playing: metrics update
//! - `Pause`: immediate metrics update
//! - `Ended`: end record, completed
//! - unmount: end record, completed if the threshold was reached

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleRecorder;
use crate::media::{MediaEvent, MediaEventReceiver};
use crate::metrics::{is_completed, MetricsAccumulator, MetricsSnapshot};
use crate::sender::{PlayWrite, WriteSender};
use crate::session::{metrics_key, KeyValueStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Final state of a session, returned on unmount
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub play_recorded: bool,
    pub completed: bool,
    pub metrics: MetricsSnapshot,
}

pub struct ListenTracker {
    recorder: LifecycleRecorder,
    accumulator: MetricsAccumulator,
    sender: WriteSender,
    /// Profile the accumulator is persisted to, when enabled
    profile: Option<Arc<dyn KeyValueStore>>,
    metrics_key: String,
    flush_period: Duration,
    completion_threshold_pct: f64,
    duration_ms: Option<u64>,
    playing: bool,
    ended: bool,
    flush: Option<Interval>,
    clock_origin: Instant,
}

impl ListenTracker {
    /// Create a tracker for one session
    ///
    /// With `persist_metrics` enabled and a profile given, counters saved by
    /// an earlier page lifetime of the same session are restored.
    pub fn new(
        recorder: LifecycleRecorder,
        config: &TrackerConfig,
        sender: WriteSender,
        profile: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        let context = recorder.context();
        let metrics_key = metrics_key(&context.share_code, &context.session_id);
        let duration_ms = context.duration_ms.filter(|d| *d > 0);
        let profile = profile.filter(|_| config.persist_metrics);

        let accumulator = profile
            .as_deref()
            .and_then(|p| restore_metrics(p, &metrics_key))
            .unwrap_or_default();

        Self {
            recorder,
            accumulator,
            sender,
            profile,
            metrics_key,
            flush_period: config.flush_interval(),
            completion_threshold_pct: config.completion_threshold_pct,
            duration_ms,
            playing: false,
            ended: false,
            flush: None,
            clock_origin: Instant::now(),
        }
    }

    pub fn accumulator(&self) -> &MetricsAccumulator {
        &self.accumulator
    }

    /// Run the tracker on its own task, consuming `events`
    pub fn spawn(self, events: MediaEventReceiver) -> TrackerHandle {
        let (unmount_tx, unmount_rx) = oneshot::channel();
        let session_id = self.recorder.session_id().to_string();
        let join = tokio::spawn(self.run(events, unmount_rx));
        TrackerHandle {
            session_id,
            unmount_tx: Some(unmount_tx),
            join,
        }
    }

    async fn run(
        mut self,
        mut events: MediaEventReceiver,
        mut unmount: oneshot::Receiver<()>,
    ) -> SessionSummary {
        info!(
            session_id = %self.recorder.session_id(),
            share_code = %self.recorder.context().share_code,
            "Listen tracker started"
        );

        loop {
            tokio::select! {
                // Events already raised are applied before a flush or unmount
                biased;

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Media event channel closed");
                        break;
                    }
                },
                _ = next_flush(&mut self.flush) => self.periodic_flush(),
                // Dropping the handle counts as unmount too
                _ = &mut unmount => break,
            }
        }

        self.unmount()
    }

    fn now_ms(&self) -> u64 {
        self.clock_origin.elapsed().as_millis() as u64
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.accumulator.snapshot(self.duration_ms)
    }

    /// Apply one media event to the accumulator and send the writes it
    /// triggers
    pub fn handle_event(&mut self, event: MediaEvent) {
        let now = self.now_ms();
        match event {
            MediaEvent::LoadedMetadata { duration_ms } => {
                if duration_ms > 0 {
                    self.duration_ms = Some(duration_ms);
                }
            }
            MediaEvent::Play => {
                let first_play = self.accumulator.on_play(now);
                self.playing = true;
                if first_play {
                    info!(session_id = %self.recorder.session_id(), "Recording session start");
                    self.sender
                        .send(PlayWrite::Start(self.recorder.start_row(Utc::now())));
                }
                self.start_flush();
                self.persist();
            }
            MediaEvent::Pause => {
                self.accumulator.on_pause(now);
                self.stop_flush();
                debug!(
                    pause_count = self.accumulator.pause_count(),
                    accumulated_ms = self.accumulator.accumulated_ms(),
                    "Pause"
                );
                self.send_metrics();
                self.persist();
            }
            MediaEvent::TimeUpdate { position_ms } => {
                self.accumulator.on_time_update(position_ms);
            }
            MediaEvent::Seeking { position_ms } => {
                self.accumulator.on_seeking();
                debug!(position_ms, seek_count = self.accumulator.seek_count(), "Seek");
            }
            MediaEvent::Ended => {
                self.accumulator.on_ended(now);
                self.stop_flush();
                self.ended = true;
                self.send_end();
                self.persist();
            }
        }
    }

    fn start_flush(&mut self) {
        if self.flush.is_some() || !self.accumulator.play_recorded() {
            return;
        }
        let mut flush = interval_at(Instant::now() + self.flush_period, self.flush_period);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.flush = Some(flush);
    }

    fn stop_flush(&mut self) {
        self.playing = false;
        self.flush = None;
    }

    fn periodic_flush(&mut self) {
        if !self.playing {
            self.flush = None;
            return;
        }
        let now = self.now_ms();
        self.accumulator.fold(now);
        self.send_metrics();
        self.persist();
    }

    fn send_metrics(&self) {
        if !self.accumulator.play_recorded() {
            return;
        }
        let update = self.recorder.metrics_update(&self.snapshot(), Utc::now());
        self.sender.send(PlayWrite::Metrics {
            session_id: self.recorder.session_id().to_string(),
            update,
        });
    }

    fn send_end(&self) {
        if !self.accumulator.play_recorded() {
            return;
        }
        let snapshot = self.snapshot();
        let update = self.recorder.end_update(&snapshot, self.ended, Utc::now());
        info!(
            session_id = %self.recorder.session_id(),
            listen_duration_ms = snapshot.listen_duration_ms,
            completion = snapshot.completion_percentage,
            completed = ?update.completed,
            "Recording session end"
        );
        self.sender.send(PlayWrite::End {
            session_id: self.recorder.session_id().to_string(),
            update,
        });
    }

    fn persist(&self) {
        let Some(profile) = self.profile.as_deref() else {
            return;
        };
        let saved = serde_json::to_string(&self.accumulator)
            .map_err(Error::from)
            .and_then(|json| profile.set(&self.metrics_key, &json));
        if let Err(e) = saved {
            warn!(key = %self.metrics_key, "Metrics not persisted: {}", e);
        }
    }

    /// Final fold and end record; stops the flush loop
    fn unmount(mut self) -> SessionSummary {
        let now = self.now_ms();
        self.accumulator.suspend(now);
        self.stop_flush();
        self.send_end();
        self.persist();

        let metrics = self.snapshot();
        let completed = self.accumulator.play_recorded()
            && is_completed(self.ended, metrics.completion_percentage, self.completion_threshold_pct);

        info!(session_id = %self.recorder.session_id(), "Listen tracker stopped");
        SessionSummary {
            session_id: self.recorder.session_id().to_string(),
            play_recorded: self.accumulator.play_recorded(),
            completed,
            metrics,
        }
    }
}

async fn next_flush(flush: &mut Option<Interval>) {
    match flush {
        Some(flush) => {
            flush.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn restore_metrics(profile: &dyn KeyValueStore, key: &str) -> Option<MetricsAccumulator> {
    let json = profile.get(key)?;
    match serde_json::from_str(&json) {
        Ok(accumulator) => {
            debug!(key = %key, "Restored persisted metrics");
            Some(accumulator)
        }
        Err(e) => {
            warn!(key = %key, "Ignoring unreadable persisted metrics: {}", e);
            None
        }
    }
}

/// Handle to a running tracker
pub struct TrackerHandle {
    session_id: String,
    unmount_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<SessionSummary>,
}

impl TrackerHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop tracking: final fold, end record, and the session summary
    pub async fn unmount(mut self) -> Result<SessionSummary> {
        if let Some(tx) = self.unmount_tx.take() {
            // Err means the tracker already stopped on its own
            let _ = tx.send(());
        }
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Tracker task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::classify;
    use crate::geo::NoopLocator;
    use crate::lifecycle::SessionContext;
    use crate::media::media_event_channel;
    use crate::sender::spawn_writer;
    use crate::session::MemoryStore;
    use crate::store::MemoryPlayStore;

    fn recorder(duration_ms: Option<u64>) -> LifecycleRecorder {
        LifecycleRecorder::new(
            SessionContext {
                session_id: "session-1".to_string(),
                track_id: "track-1".to_string(),
                share_code: "code1234".to_string(),
                duration_ms,
                device: classify("Mozilla/5.0 (Macintosh) Safari/605.1.15"),
                referrer_url: None,
            },
            90.0,
        )
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_writes_folded_time_immediately() {
        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &TrackerConfig::default(), sender, None);
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);

        tx.send(MediaEvent::Play).unwrap();
        sleep_ms(3_000).await;
        tx.send(MediaEvent::Pause).unwrap();
        sleep_ms(10).await;

        // Well before the first 5s tick
        let row = store.get("session-1").await.unwrap();
        assert_eq!(row.listen_duration_ms, 3_000);
        assert_eq!(row.pause_count, 1);

        handle.unmount().await.unwrap();
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_recorded_after_failed_start() {
        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &TrackerConfig::default(), sender, None);
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);

        store.fail_next(1);
        tx.send(MediaEvent::Play).unwrap();
        sleep_ms(30_000).await;
        tx.send(MediaEvent::Pause).unwrap();
        sleep_ms(10).await;

        handle.unmount().await.unwrap();
        let stats = writer.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.missing, 0);

        let row = store.get("session-1").await.unwrap();
        assert_eq!(row.listen_duration_ms, 30_000);
        assert_eq!(row.pause_count, 1);
        assert_eq!(row.play_count, 1);
        assert!(row.ended_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_writes_before_first_play() {
        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &TrackerConfig::default(), sender, None);
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);

        tx.send(MediaEvent::LoadedMetadata { duration_ms: 100_000 }).unwrap();
        tx.send(MediaEvent::Seeking { position_ms: 5_000 }).unwrap();
        sleep_ms(20_000).await;

        let summary = handle.unmount().await.unwrap();
        let stats = writer.await.unwrap();
        assert!(!summary.play_recorded);
        assert_eq!(stats.applied + stats.failed + stats.missing, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_flush_while_playing() {
        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &TrackerConfig::default(), sender, None);
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);

        tx.send(MediaEvent::Play).unwrap();
        tx.send(MediaEvent::TimeUpdate { position_ms: 10_000 }).unwrap();
        sleep_ms(10_500).await;

        let row = store.get("session-1").await.unwrap();
        assert_eq!(row.listen_duration_ms, 10_000);
        assert_eq!(row.max_position_reached_ms, 10_000);
        assert_eq!(row.completion_percentage, 10.0);

        handle.unmount().await.unwrap();
        // start + two ticks + end
        assert_eq!(writer.await.unwrap().applied, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_at_threshold_marks_completed() {
        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &TrackerConfig::default(), sender, None);
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);

        tx.send(MediaEvent::Play).unwrap();
        tx.send(MediaEvent::TimeUpdate { position_ms: 90_000 }).unwrap();
        sleep_ms(1_000).await;

        let summary = handle.unmount().await.unwrap();
        writer.await.unwrap();

        assert!(summary.completed);
        let row = store.get("session-1").await.unwrap();
        assert!(row.completed);
        assert!(row.ended_at.is_some());
        assert_eq!(row.listen_duration_ms, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_restored_from_profile() {
        let profile: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = TrackerConfig::default();

        let store = Arc::new(MemoryPlayStore::new());
        let (sender, writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let tracker = ListenTracker::new(recorder(Some(100_000)), &config, sender, Some(profile.clone()));
        let (tx, rx) = media_event_channel();
        let handle = tracker.spawn(rx);
        tx.send(MediaEvent::Play).unwrap();
        sleep_ms(2_000).await;
        tx.send(MediaEvent::Pause).unwrap();
        sleep_ms(10).await;
        handle.unmount().await.unwrap();
        writer.await.unwrap();

        let (sender, _writer) = spawn_writer(store.clone(), Arc::new(NoopLocator));
        let reloaded = ListenTracker::new(recorder(Some(100_000)), &config, sender, Some(profile));
        assert!(reloaded.accumulator().play_recorded());
        assert_eq!(reloaded.accumulator().pause_count(), 1);
        assert_eq!(reloaded.accumulator().accumulated_ms(), 2_000);
    }
}
