//! Session-scoped string storage backing the persistent cache.
//!
//! Mirrors the browser `sessionStorage` contract: a flat map of string keys to
//! string values that outlives a single engine instance.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempid_types::StorageError;

const DEFAULT_STORAGE_FILE: &str = "session_storage.json";

/// Flat string key/value store.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Clones share the same items, which lets a second
/// cache instance "reload" what the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// JSON file holding the whole storage map; rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl FileSessionStorage {
    /// Opens (or lazily creates) the storage file at `path`.
    ///
    /// An unreadable or malformed file is reported as an error so callers can
    /// decide to start over with [`FileSessionStorage::empty`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StorageError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&content)
                .map_err(|e| StorageError::Corrupt { message: e.to_string() })?
        } else {
            HashMap::new()
        };
        Ok(Self { path, items: Mutex::new(items) })
    }

    /// Storage at `path` that ignores any existing content.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), items: Mutex::new(HashMap::new()) }
    }

    /// `<data dir>/tempid/session_storage.json`.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let base = dirs::data_local_dir().ok_or_else(|| StorageError::Read {
            path: "<data dir>".to_string(),
            message: "Could not determine local data directory".to_string(),
        })?;
        Ok(base.join("tempid").join(DEFAULT_STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(&self.path, e))?;
        }
        let content = serde_json::to_string(items).map_err(|e| write_error(&self.path, e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| write_error(&self.path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| write_error(&self.path, e))
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::Write { path: path.display().to_string(), message: e.to_string() }
}

impl SessionStorage for FileSessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        items.insert(key.to_string(), value.to_string());
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }
}
