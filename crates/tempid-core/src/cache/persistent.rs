//! Cache backend that survives reloads through [`SessionStorage`].
//!
//! Layout under namespace `ns`:
//!
//! ```text
//! ns.itemCount : "<decimal count>"
//! ns.subjects  : {"<subject>": {"<key>": {"time": <epoch ms>, "value": ...}}}
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use tempid_types::{ResolvedValue, StorageError, Subject, TempKey};

use super::{CacheIndex, CacheLimits, Clock, SessionStorage, SubjectMap, SystemClock, TempIdCache};

/// Write-through mirror of a [`CacheIndex`] in session storage.
pub struct PersistentCache<S: SessionStorage> {
    index: Mutex<CacheIndex>,
    storage: S,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStorage> PersistentCache<S> {
    /// Opens the cache, rehydrating whatever `storage` holds under `namespace`.
    ///
    /// Missing or unreadable state starts an empty cache.
    pub fn open(storage: S, namespace: impl Into<String>, limits: CacheLimits) -> Self {
        Self::open_with_clock(storage, namespace, limits, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        storage: S,
        namespace: impl Into<String>,
        limits: CacheLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let namespace = namespace.into();
        let index = match read_session(&storage, &namespace) {
            Ok(Some(subjects)) => {
                let index = CacheIndex::from_subjects(subjects, limits);
                tracing::debug!(
                    "[TempIdCache] Restored {} entries from session storage '{}'",
                    index.len(),
                    namespace
                );
                index
            },
            Ok(None) => CacheIndex::new(limits),
            Err(e) => {
                tracing::warn!(
                    "[TempIdCache] Discarding unreadable session cache '{}': {}",
                    namespace,
                    e
                );
                CacheIndex::new(limits)
            },
        };
        Self { index: Mutex::new(index), storage, namespace, clock }
    }

    fn save_session(&self, index: &CacheIndex) {
        if let Err(e) = write_session(&self.storage, &self.namespace, index) {
            tracing::warn!("[TempIdCache] Failed to persist session cache: {}", e);
        }
    }
}

fn subjects_key(namespace: &str) -> String {
    format!("{}.subjects", namespace)
}

fn item_count_key(namespace: &str) -> String {
    format!("{}.itemCount", namespace)
}

fn read_session<S: SessionStorage>(
    storage: &S,
    namespace: &str,
) -> Result<Option<SubjectMap>, StorageError> {
    let Some(raw) = storage.get_item(&subjects_key(namespace))? else {
        return Ok(None);
    };
    let subjects: Option<SubjectMap> = serde_json::from_str(&raw)
        .map_err(|e| StorageError::Corrupt { message: e.to_string() })?;
    let Some(subjects) = subjects else {
        return Ok(None);
    };

    let stored_count = storage
        .get_item(&item_count_key(namespace))?
        .and_then(|raw| raw.trim().parse::<usize>().ok());
    let actual_count: usize = subjects.values().map(std::collections::HashMap::len).sum();
    if stored_count != Some(actual_count) {
        tracing::debug!(
            "[TempIdCache] Stored item count {:?} disagrees with {} stored entries, recounting",
            stored_count,
            actual_count
        );
    }
    Ok(Some(subjects))
}

fn write_session<S: SessionStorage>(
    storage: &S,
    namespace: &str,
    index: &CacheIndex,
) -> Result<(), StorageError> {
    let subjects = serde_json::to_string(index.subjects())
        .map_err(|e| StorageError::Write { path: namespace.to_string(), message: e.to_string() })?;
    storage.set_item(&subjects_key(namespace), &subjects)?;
    storage.set_item(&item_count_key(namespace), &index.len().to_string())
}

fn remove_session<S: SessionStorage>(storage: &S, namespace: &str) -> Result<(), StorageError> {
    storage.remove_item(&subjects_key(namespace))?;
    storage.remove_item(&item_count_key(namespace))
}

impl<S: SessionStorage> TempIdCache for PersistentCache<S> {
    fn get_value(&self, subject: &Subject, key: &TempKey) -> Option<ResolvedValue> {
        self.index.lock().get(subject, key).cloned()
    }

    fn set_value(&self, subject: &Subject, key: &TempKey, value: ResolvedValue) {
        let now = self.clock.now_millis();
        let mut index = self.index.lock();
        index.insert(subject, key, value, now);
        self.save_session(&index);
    }

    fn clear_value(&self, subject: Option<&Subject>, key: &TempKey) {
        let mut index = self.index.lock();
        let removed = index.remove(subject, key);
        tracing::debug!("[TempIdCache] Invalidated {} entries for key {}", removed, key);
        self.save_session(&index);
    }

    fn len(&self) -> usize {
        self.index.lock().len()
    }

    fn clear(&self) {
        let mut index = self.index.lock();
        index.clear();
        if let Err(e) = remove_session(&self.storage, &self.namespace) {
            tracing::warn!("[TempIdCache] Failed to remove session cache: {}", e);
        }
    }
}
