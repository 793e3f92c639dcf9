//! Scripted listening
//!
//! A listen script is a TOML list of steps driving a media element, so the
//! CLI can stand in for a listener:
//!
//! ```toml
//! [[step]]
//! action = "play"
//!
//! [[step]]
//! action = "wait"
//! ms = 10000
//!
//! [[step]]
//! action = "seek"
//! position_ms = 60000
//! ```

use crate::error::{Error, Result};
use crate::media::MediaElement;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Extra wait after the nominal end so the `Ended` event is raised
const END_MARGIN_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    Play,
    Pause,
    Seek { position_ms: u64 },
    Wait { ms: u64 },
    Volume { level: f32 },
    Mute { muted: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListenScript {
    #[serde(default, rename = "step")]
    pub steps: Vec<ScriptStep>,
}

impl ListenScript {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let script: ListenScript = toml::from_str(text)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Play from the start and wait until the end
    pub fn play_through(duration_ms: u64) -> Self {
        Self {
            steps: vec![
                ScriptStep::Play,
                ScriptStep::Wait {
                    ms: duration_ms + END_MARGIN_MS,
                },
            ],
        }
    }

    fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            if let ScriptStep::Volume { level } = step {
                if !(0.0..=1.0).contains(level) {
                    return Err(Error::BadRequest(format!(
                        "step {}: volume {} outside 0.0-1.0",
                        index + 1,
                        level
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total time spent in `wait` steps
    pub fn total_wait(&self) -> Duration {
        let ms = self
            .steps
            .iter()
            .map(|step| match step {
                ScriptStep::Wait { ms } => *ms,
                _ => 0,
            })
            .sum();
        Duration::from_millis(ms)
    }

    /// Apply every step to `media` in order
    pub async fn run(&self, media: &dyn MediaElement) {
        info!(steps = self.steps.len(), "Running listen script");
        for step in &self.steps {
            debug!(?step, position_ms = media.current_time_ms(), "Script step");
            match step {
                ScriptStep::Play => media.play(),
                ScriptStep::Pause => media.pause(),
                ScriptStep::Seek { position_ms } => media.set_current_time_ms(*position_ms),
                ScriptStep::Wait { ms } => sleep(Duration::from_millis(*ms)).await,
                ScriptStep::Volume { level } => media.set_volume(*level),
                ScriptStep::Mute { muted } => media.set_muted(*muted),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{media_event_channel, MediaEvent, SimulatedMedia};

    #[test]
    fn test_parse_steps() {
        let script = ListenScript::from_toml_str(
            r#"
            [[step]]
            action = "play"

            [[step]]
            action = "wait"
            ms = 1500

            [[step]]
            action = "seek"
            position_ms = 60000

            [[step]]
            action = "volume"
            level = 0.25

            [[step]]
            action = "mute"
            muted = true

            [[step]]
            action = "pause"
            "#,
        )
        .unwrap();

        assert_eq!(
            script.steps,
            vec![
                ScriptStep::Play,
                ScriptStep::Wait { ms: 1500 },
                ScriptStep::Seek { position_ms: 60_000 },
                ScriptStep::Volume { level: 0.25 },
                ScriptStep::Mute { muted: true },
                ScriptStep::Pause,
            ]
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = ListenScript::from_toml_str("[[step]]\naction = \"rewind\"\n");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_volume_out_of_range_rejected() {
        let result = ListenScript::from_toml_str("[[step]]\naction = \"volume\"\nlevel = 1.5\n");
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_empty_script() {
        let script = ListenScript::from_toml_str("").unwrap();
        assert!(script.steps.is_empty());
        assert_eq!(script.total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_play_through_waits_past_end() {
        let script = ListenScript::play_through(10_000);
        assert_eq!(script.total_wait(), Duration::from_millis(10_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_media() {
        let (tx, mut rx) = media_event_channel();
        let media = SimulatedMedia::spawn(60_000, tx);
        let script = ListenScript {
            steps: vec![
                ScriptStep::Play,
                ScriptStep::Wait { ms: 1_000 },
                ScriptStep::Pause,
                ScriptStep::Volume { level: 0.3 },
            ],
        };

        script.run(media.as_ref()).await;

        assert!(media.is_paused());
        assert!((media.volume() - 0.3).abs() < f32::EPSILON);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&MediaEvent::Play));
        assert_eq!(events.last(), Some(&MediaEvent::Pause));
    }
}
