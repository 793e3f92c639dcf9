//! Tests for root folder resolution and config file discovery
//!
//! Tests touching LISTEN_ROOT_FOLDER are marked #[serial] so they never run
//! alongside each other.

use listen_common::config::{
    default_root_folder, read_config_text, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn toml_with_root(root: &str) -> TomlConfig {
    TomlConfig {
        root_folder: Some(PathBuf::from(root)),
        log_level: None,
    }
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), Some(&toml_with_root("/from/toml")));
    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(None, Some(&toml_with_root("/from/toml")));
    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "  ");
    let resolved = resolve_root_folder(None, Some(&toml_with_root("/from/toml")));
    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_falls_back_to_platform_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, None), default_root_folder());
    assert!(default_root_folder().ends_with("listen-tracker") || default_root_folder().ends_with("listen_data"));
}

#[test]
fn test_explicit_config_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/srv/listen\"\n").unwrap();

    let (found, text) = read_config_text(Some(&path)).unwrap().unwrap();
    assert_eq!(found, path);
    let config = TomlConfig::from_toml_str(&text).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/listen")));
}
