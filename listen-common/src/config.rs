//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "listen-tracker";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LISTEN_ROOT_FOLDER";

/// SQLite database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "listen.db";

/// Local key-value profile file name inside the root folder
pub const PROFILE_FILE_NAME: &str = "profile.json";

/// Top-level keys shared by every binary reading the TOML config file
///
/// Crate-specific sections are parsed separately from the same text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and the listener profile
    pub root_folder: Option<PathBuf>,
    /// Log level (`debug`) or a full filter directive (`listen_tracker=debug,sqlx=warn`)
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse the shared keys out of TOML text, ignoring unknown sections
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: Option<&TomlConfig>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root) = toml.and_then(|t| t.root_folder.clone()) {
        return root;
    }

    default_root_folder()
}

/// Read the config file text
///
/// An explicit path must exist. Without one the platform locations are
/// searched; finding nothing is not an error and yields `None`.
///
/// Nothing is logged here; callers report which file was used.
pub fn read_config_text(explicit: Option<&Path>) -> Result<Option<(PathBuf, String)>> {
    if let Some(path) = explicit {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        return Ok(Some((path.to_path_buf(), text)));
    }

    match default_config_path() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            Ok(Some((path, text)))
        }
        None => Ok(None),
    }
}

/// Get the first existing configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./listen_data"))
}

/// Database file location inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Listener profile (local storage) location inside a root folder
pub fn profile_path(root_folder: &Path) -> PathBuf {
    root_folder.join(PROFILE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config_ignores_unknown_sections() {
        let text = r#"
            root_folder = "/srv/listen"
            log_level = "debug"

            [tracker]
            flush_interval_ms = 2000
        "#;
        let config = TomlConfig::from_toml_str(text).unwrap();
        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/listen")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_toml_config_rejects_invalid_text() {
        let result = TomlConfig::from_toml_str("root_folder = [");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_paths_inside_root_folder() {
        let root = PathBuf::from("/tmp/listen-root");
        assert_eq!(database_path(&root), root.join("listen.db"));
        assert_eq!(profile_path(&root), root.join("profile.json"));
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let result = read_config_text(Some(Path::new("/nonexistent/listen/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
