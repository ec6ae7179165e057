//! Bounded `(subject, temp-ID) -> value` cache.
//!
//! Two interchangeable backends share one eviction implementation
//! ([`CacheIndex`]):
//!
//! - [`MemoryCache`] lives as long as the process.
//! - [`PersistentCache`] mirrors itself into a [`SessionStorage`] after every
//!   mutation and rehydrates from it when opened.
//!
//! Eviction is a reset-under-pressure policy rather than LRU: once the store
//! holds `max_items` entries, an insert first drops every entry older than
//! `max_age`, and if that frees nothing the whole store is cleared.

mod clock;
mod memory;
mod persistent;
mod storage;


pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryCache;
pub use persistent::PersistentCache;
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tempid_types::{CacheConfig, ResolvedValue, Subject, TempKey};

/// Read/write access to resolved values shared by the engine and its callers.
pub trait TempIdCache: Send + Sync {
    /// Pure lookup; never touches the network and never evicts.
    fn get_value(&self, subject: &Subject, key: &TempKey) -> Option<ResolvedValue>;

    /// Inserts or atomically replaces an entry, evicting first when full.
    fn set_value(&self, subject: &Subject, key: &TempKey, value: ResolvedValue);

    /// Removes one entry, or the key under every subject when `subject` is `None`.
    fn clear_value(&self, subject: Option<&Subject>, key: &TempKey);

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    fn clear(&self);
}

/// Capacity and age bounds of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_age: Duration,
    pub max_items: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self { max_age: Duration::from_secs(12 * 60), max_items: 1000 }
    }
}

impl From<&CacheConfig> for CacheLimits {
    fn from(config: &CacheConfig) -> Self {
        Self { max_age: Duration::from_secs(config.max_age_secs), max_items: config.max_items }
    }
}

/// Stored value with its insertion time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CacheEntry {
    pub(crate) time: i64,
    pub(crate) value: ResolvedValue,
}

pub(crate) type SubjectMap = HashMap<Subject, HashMap<TempKey, CacheEntry>>;

/// Storage model and eviction policy shared by both backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct CacheIndex {
    subjects: SubjectMap,
    item_count: usize,
    limits: CacheLimits,
}

impl CacheIndex {
    pub(crate) fn new(limits: CacheLimits) -> Self {
        Self { subjects: HashMap::new(), item_count: 0, limits }
    }

    /// Rebuilds an index from persisted state, recounting the entries.
    pub(crate) fn from_subjects(subjects: SubjectMap, limits: CacheLimits) -> Self {
        let item_count = subjects.values().map(HashMap::len).sum();
        Self { subjects, item_count, limits }
    }

    pub(crate) fn subjects(&self) -> &SubjectMap {
        &self.subjects
    }

    pub(crate) fn len(&self) -> usize {
        self.item_count
    }

    pub(crate) fn get(&self, subject: &Subject, key: &TempKey) -> Option<&ResolvedValue> {
        self.subjects.get(subject).and_then(|keys| keys.get(key)).map(|entry| &entry.value)
    }

    pub(crate) fn insert(
        &mut self,
        subject: &Subject,
        key: &TempKey,
        value: ResolvedValue,
        now_millis: i64,
    ) {
        if self.item_count >= self.limits.max_items {
            let removed = self.sweep_expired(now_millis);
            tracing::debug!(
                "[TempIdCache] Capacity sweep removed {} expired entries ({} left)",
                removed,
                self.item_count
            );
        }
        if self.item_count >= self.limits.max_items {
            tracing::debug!(
                "[TempIdCache] Still at capacity ({}) after sweep, resetting cache",
                self.item_count
            );
            self.clear();
        }

        let entry = CacheEntry { time: now_millis, value };
        if self.subjects.entry(subject.clone()).or_default().insert(key.clone(), entry).is_none() {
            self.item_count += 1;
        }
    }

    /// Removes matching entries and returns how many were dropped.
    pub(crate) fn remove(&mut self, subject: Option<&Subject>, key: &TempKey) -> usize {
        let removed = match subject {
            Some(subject) => self
                .subjects
                .get_mut(subject)
                .and_then(|keys| keys.remove(key))
                .map_or(0, |_| 1),
            None => self.subjects.values_mut().filter_map(|keys| keys.remove(key)).count(),
        };
        self.subjects.retain(|_, keys| !keys.is_empty());
        self.item_count -= removed;
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.subjects.clear();
        self.item_count = 0;
    }

    /// Drops every entry inserted before `now - max_age`.
    pub(crate) fn sweep_expired(&mut self, now_millis: i64) -> usize {
        let max_age_millis = i64::try_from(self.limits.max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_millis.saturating_sub(max_age_millis);
        let before = self.item_count;

        for keys in self.subjects.values_mut() {
            keys.retain(|_, entry| entry.time >= cutoff);
        }
        self.subjects.retain(|_, keys| !keys.is_empty());
        self.item_count = self.subjects.values().map(HashMap::len).sum();
        before - self.item_count
    }
}
