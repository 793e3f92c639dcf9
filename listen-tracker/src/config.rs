//! listen-tracker specific configuration
//!
//! Values come from the `[tracker]` section of the shared TOML config file.
//! Every key is optional; a missing file or section yields the defaults.

use crate::error::{Error, Result};
use crate::session::SessionScope;
use listen_common::config::{self as common_config, TomlConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default periodic flush interval while playing
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

/// Default completion threshold (percent of the track reached)
pub const DEFAULT_COMPLETION_THRESHOLD_PCT: f64 = 90.0;

/// Default reverse-IP geolocation endpoint
pub const DEFAULT_GEOLOCATION_ENDPOINT: &str = "https://ipapi.co/json/";

/// Log filter used when neither `RUST_LOG` nor `log_level` is set
pub const DEFAULT_LOG_FILTER: &str = "listen_tracker=info,listen_common=info";

/// Tracker behavior settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Interval between metric flushes while playing
    pub flush_interval_ms: u64,
    /// Completion percentage at which a session counts as completed
    pub completion_threshold_pct: f64,
    /// Whether session ids are scoped per track or per profile
    pub session_scope: SessionScope,
    /// Persist accumulated counters in the profile so reloads resume them
    pub persist_metrics: bool,
    pub geolocation: GeolocationConfig,
}

impl TrackerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Reject values the flush loop and completion rule cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            return Err(Error::Config("flush_interval_ms must be greater than 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.completion_threshold_pct) {
            return Err(Error::Config(format!(
                "completion_threshold_pct must be within 0-100, got {}",
                self.completion_threshold_pct
            )));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            completion_threshold_pct: DEFAULT_COMPLETION_THRESHOLD_PCT,
            session_scope: SessionScope::default(),
            persist_metrics: true,
            geolocation: GeolocationConfig::default(),
        }
    }
}

/// Best-effort listener geolocation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_GEOLOCATION_ENDPOINT.to_string(),
            timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    tracker: TrackerConfig,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub profile_path: PathBuf,
    pub log_level: Option<String>,
    pub tracker: TrackerConfig,
    /// Config file the values came from; `None` means built-in defaults
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load the config file (explicit path or platform default) and resolve
    /// the root folder against the CLI argument and environment
    pub fn load(config_file: Option<&Path>, root_folder_arg: Option<&Path>) -> Result<Self> {
        match common_config::read_config_text(config_file)? {
            Some((path, text)) => {
                let mut config = Self::from_parts(Some(&text), root_folder_arg)?;
                config.config_file = Some(path);
                Ok(config)
            }
            None => Self::from_parts(None, root_folder_arg),
        }
    }

    /// `EnvFilter` directive for the configured `log_level`
    ///
    /// A bare level applies to the workspace crates; anything containing `=`
    /// or `,` is taken as a complete directive.
    pub fn log_filter(&self) -> String {
        match self.log_level.as_deref().map(str::trim) {
            Some(directive) if directive.contains('=') || directive.contains(',') => {
                directive.to_string()
            }
            Some(level) if !level.is_empty() => {
                format!("listen_tracker={level},listen_common={level}")
            }
            _ => DEFAULT_LOG_FILTER.to_string(),
        }
    }

    /// Build a config from TOML text (if any) and an optional root override
    pub fn from_parts(toml_text: Option<&str>, root_folder_arg: Option<&Path>) -> Result<Self> {
        let (common, file) = match toml_text {
            Some(text) => (TomlConfig::from_toml_str(text)?, toml::from_str::<FileConfig>(text)?),
            None => (TomlConfig::default(), FileConfig::default()),
        };
        file.tracker.validate()?;

        let root_folder = common_config::resolve_root_folder(root_folder_arg, Some(&common));
        Ok(Self {
            db_path: common_config::database_path(&root_folder),
            profile_path: common_config::profile_path(&root_folder),
            root_folder,
            log_level: common.log_level,
            tracker: file.tracker,
            config_file: None,
        })
    }
}
