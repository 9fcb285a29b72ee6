//! File-backed persistent store.
//!
//! The whole key/value map is kept in one JSON file:
//!
//! ```text
//! ~/.tabsync/store.json
//! {
//!   "user": "{\"uid\":\"abc\",\"source\":\"provider\"}",
//!   "theme": "\"dark\""
//! }
//! ```

use crate::{BackendError, StorageBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Durable file-based backend.
///
/// The default backend outside tests, suitable for single-machine use.
///
/// # Features
///
/// - Entries persisted as a pretty-printed JSON map
/// - Atomic writes (write to temp, then rename)
/// - Automatic directory creation
/// - Whole map loaded once at construction; reads are in-memory
///
/// # Example
///
/// ```no_run
/// use tabsync_store::{FileBackend, StorageBackend};
/// use std::path::PathBuf;
///
/// # fn example() -> Result<(), tabsync_store::BackendError> {
/// let backend = FileBackend::new(PathBuf::from("~/.tabsync/store.json"))?;
/// backend.set_item("theme", "\"dark\"")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileBackend {
    /// Path of the JSON map file.
    path: PathBuf,
    /// In-memory copy of the persisted map.
    entries: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Opens (or creates) a file-backed store at `path`.
    ///
    /// `~` is expanded to the home directory. The parent directory is
    /// created if missing. A missing or unreadable map file starts the
    /// store empty rather than failing: stale cache is preferred over
    /// blocking the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] if the parent directory cannot be
    /// created.
    pub fn new(path: PathBuf) -> Result<Self, BackendError> {
        let path = expand_tilde(&path);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BackendError::Io(format!("creating {}: {e}", parent.display())))?;
            }
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the path of the map file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the map to disk via the temp-then-rename pattern.
    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), BackendError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| BackendError::Io(e.to_string()))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, &json).map_err(|e| BackendError::Io(e.to_string()))?;
        std::fs::rename(&temp, &self.path).map_err(|e| BackendError::Io(e.to_string()))?;

        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Expands `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}

/// Returns the default store file path.
#[must_use]
pub fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabsync")
        .join("store.json")
}
