//! Media element abstraction
//!
//! A playable resource with play/pause/seek/volume controls that raises
//! lifecycle events on a channel. The tracker only consumes the events; the
//! controls are driven by whoever owns the element (the CLI script runner,
//! tests).

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

/// How often a playing element reports its position
pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Volume restored on unmute when the element was muted from zero
const UNMUTE_FALLBACK_VOLUME: f32 = 0.5;

/// Lifecycle events raised by a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// Duration became known
    LoadedMetadata { duration_ms: u64 },
    /// Playback started or resumed
    Play,
    /// Playback paused by the listener
    Pause,
    /// Periodic position report while playing (and after a seek)
    TimeUpdate { position_ms: u64 },
    /// A seek to `position_ms` started
    Seeking { position_ms: u64 },
    /// Playback reached the end of the resource
    Ended,
}

pub type MediaEventSender = mpsc::UnboundedSender<MediaEvent>;
pub type MediaEventReceiver = mpsc::UnboundedReceiver<MediaEvent>;

/// Create the channel a media element raises its events on
pub fn media_event_channel() -> (MediaEventSender, MediaEventReceiver) {
    mpsc::unbounded_channel()
}

/// Controls of a single playable resource
pub trait MediaElement: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn current_time_ms(&self) -> u64;
    /// Seek to `position_ms`
    fn set_current_time_ms(&self, position_ms: u64);
    fn volume(&self) -> f32;
    /// Set volume, clamped to 0.0-1.0
    fn set_volume(&self, volume: f32);
    fn is_muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    /// Duration once metadata is loaded
    fn duration_ms(&self) -> Option<u64>;
    fn is_paused(&self) -> bool;
}

#[derive(Debug)]
struct SimState {
    playing: bool,
    ended: bool,
    /// Position at the last pause/seek/resume
    base_position_ms: u64,
    resumed_at: Option<Instant>,
    volume: f32,
    muted: bool,
    volume_before_mute: f32,
}

/// Clock-driven media element
///
/// Position advances with tokio time while playing, so tests running with a
/// paused clock get deterministic event sequences.
#[derive(Debug)]
pub struct SimulatedMedia {
    duration_ms: u64,
    state: Mutex<SimState>,
    events: MediaEventSender,
}

impl SimulatedMedia {
    /// Create the element, announce its metadata and start the position ticker
    ///
    /// The ticker stops once the element is dropped or the event receiver
    /// goes away.
    pub fn spawn(duration_ms: u64, events: MediaEventSender) -> Arc<Self> {
        let media = Arc::new(Self {
            duration_ms,
            state: Mutex::new(SimState {
                playing: false,
                ended: false,
                base_position_ms: 0,
                resumed_at: None,
                volume: 1.0,
                muted: false,
                volume_before_mute: 1.0,
            }),
            events,
        });

        media.emit(MediaEvent::LoadedMetadata { duration_ms });

        let weak = Arc::downgrade(&media);
        tokio::spawn(async move {
            Self::time_update_loop(weak).await;
        });

        media
    }

    async fn time_update_loop(media: Weak<Self>) {
        let mut tick = interval(TIME_UPDATE_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let Some(media) = media.upgrade() else {
                break;
            };
            if media.events.is_closed() {
                break;
            }
            media.tick();
        }
        debug!("Simulated media ticker stopped");
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn emit(&self, event: MediaEvent) {
        // No receiver is fine: nobody is tracking this element
        let _ = self.events.send(event);
    }

    fn position_of(&self, state: &SimState) -> u64 {
        let elapsed = state
            .resumed_at
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (state.base_position_ms + elapsed).min(self.duration_ms)
    }

    fn tick(&self) {
        let mut state = self.lock();
        if !state.playing {
            return;
        }

        let position_ms = self.position_of(&state);
        if position_ms >= self.duration_ms {
            state.playing = false;
            state.ended = true;
            state.base_position_ms = self.duration_ms;
            state.resumed_at = None;
            drop(state);
            self.emit(MediaEvent::TimeUpdate { position_ms: self.duration_ms });
            self.emit(MediaEvent::Ended);
        } else {
            drop(state);
            self.emit(MediaEvent::TimeUpdate { position_ms });
        }
    }
}

impl MediaElement for SimulatedMedia {
    fn play(&self) {
        let mut state = self.lock();
        if state.playing {
            return;
        }
        if state.ended {
            // Playing an ended element restarts it
            state.ended = false;
            state.base_position_ms = 0;
        }
        state.playing = true;
        state.resumed_at = Some(Instant::now());
        drop(state);
        self.emit(MediaEvent::Play);
    }

    fn pause(&self) {
        let mut state = self.lock();
        if !state.playing {
            return;
        }
        state.base_position_ms = self.position_of(&state);
        state.playing = false;
        state.resumed_at = None;
        drop(state);
        self.emit(MediaEvent::Pause);
    }

    fn current_time_ms(&self) -> u64 {
        let state = self.lock();
        self.position_of(&state)
    }

    fn set_current_time_ms(&self, position_ms: u64) {
        let position_ms = position_ms.min(self.duration_ms);
        self.emit(MediaEvent::Seeking { position_ms });

        let mut state = self.lock();
        state.base_position_ms = position_ms;
        state.ended = false;
        if state.playing {
            state.resumed_at = Some(Instant::now());
        }
        drop(state);
        self.emit(MediaEvent::TimeUpdate { position_ms });
    }

    fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        let mut state = self.lock();
        state.volume = volume.clamp(0.0, 1.0);
        state.volume_before_mute = state.volume;
        state.muted = state.volume == 0.0;
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        let mut state = self.lock();
        if muted == state.muted {
            return;
        }
        if muted {
            state.volume_before_mute = state.volume;
            state.volume = 0.0;
        } else if state.volume_before_mute > 0.0 {
            state.volume = state.volume_before_mute;
        } else {
            state.volume = UNMUTE_FALLBACK_VOLUME;
        }
        state.muted = muted;
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(self.duration_ms)
    }

    fn is_paused(&self) -> bool {
        !self.lock().playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut MediaEventReceiver) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_announces_metadata() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(10_000, tx);
        assert_eq!(rx.recv().await, Some(MediaEvent::LoadedMetadata { duration_ms: 10_000 }));
        assert!(media.is_paused());
        assert_eq!(media.duration_ms(), Some(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_advances_position_and_reports_time() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(10_000, tx);
        media.play();
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert!(media.current_time_ms() >= 1_000);
        let events = drain(&mut rx);
        assert_eq!(events[1], MediaEvent::Play);
        assert!(events.iter().any(|e| matches!(e, MediaEvent::TimeUpdate { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_play_and_pause_emit_once() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(10_000, tx);
        media.play();
        media.play();
        media.pause();
        media.pause();

        let events = drain(&mut rx);
        assert_eq!(events.iter().filter(|e| **e == MediaEvent::Play).count(), 1);
        assert_eq!(events.iter().filter(|e| **e == MediaEvent::Pause).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_emits_seeking_then_time_update() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(10_000, tx);
        media.set_current_time_ms(4_000);

        let events = drain(&mut rx);
        assert_eq!(
            &events[1..],
            &[
                MediaEvent::Seeking { position_ms: 4_000 },
                MediaEvent::TimeUpdate { position_ms: 4_000 },
            ]
        );
        assert_eq!(media.current_time_ms(), 4_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaching_duration_emits_ended() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(1_000, tx);
        media.play();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&MediaEvent::Ended));
        assert!(media.is_paused());
        assert_eq!(media.current_time_ms(), 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_restores_previous_volume() {
        let (tx, _rx) = media_event_channel();
        let media = SimulatedMedia::spawn(1_000, tx);
        media.set_volume(0.8);
        media.set_muted(true);
        assert_eq!(media.volume(), 0.0);
        media.set_muted(false);
        assert_eq!(media.volume(), 0.8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmute_from_zero_uses_fallback() {
        let (tx, _rx) = media_event_channel();
        let media = SimulatedMedia::spawn(1_000, tx);
        media.set_volume(0.0);
        assert!(media.is_muted());
        media.set_muted(false);
        assert_eq!(media.volume(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_clamped() {
        let (tx, _rx) = media_event_channel();
        let media = SimulatedMedia::spawn(1_000, tx);
        media.set_volume(3.0);
        assert_eq!(media.volume(), 1.0);
    }
}
