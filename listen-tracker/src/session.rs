//! Session identity and local key-value persistence
//!
//! The listener profile is a small string key-value store, the equivalent of
//! a browser's local storage. It holds the session id for each track and the
//! persisted metric counters.

use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Key prefix under which session ids are stored
const SESSION_KEY_PREFIX: &str = "shareable_track_session";

/// String key-value persistence owned by one listener profile
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Non-persistent store; lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Profile stored as a JSON object on disk
///
/// The whole file is rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the profile at `path`
    ///
    /// A missing file is an empty profile. An unreadable or corrupt file is
    /// logged and treated as empty; it is replaced on the next `set`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring corrupt profile {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Cannot read profile {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Which plays share a session id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    /// One session id per share code
    #[default]
    PerTrack,
    /// One session id for every track played in the profile
    Profile,
}

impl SessionScope {
    /// Storage key holding the session id for `share_code`
    pub fn storage_key(&self, share_code: &str) -> String {
        match self {
            SessionScope::PerTrack => format!("{}_{}", SESSION_KEY_PREFIX, share_code),
            SessionScope::Profile => SESSION_KEY_PREFIX.to_string(),
        }
    }
}

/// Return the session id stored under `key`, creating and persisting one
/// if absent
///
/// When persisting fails the fresh id is still returned; it just won't
/// survive a reload.
pub fn resolve_session_id(store: &dyn KeyValueStore, key: &str) -> String {
    if let Some(existing) = store.get(key).filter(|id| !id.trim().is_empty()) {
        debug!(key = %key, session_id = %existing, "Reusing stored session");
        return existing;
    }

    let session_id = listen_common::uuid_utils::generate_string();
    match store.set(key, &session_id) {
        Ok(()) => info!(key = %key, session_id = %session_id, "Created new session"),
        Err(e) => warn!(key = %key, "Session id not persisted: {}", e),
    }
    session_id
}

/// Storage key holding persisted metrics for a session
pub fn metrics_key(share_code: &str, session_id: &str) -> String {
    format!("listen_metrics_{}_{}", share_code, session_id)
}
