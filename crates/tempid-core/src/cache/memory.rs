//! Process-lifetime cache backend.

use parking_lot::Mutex;
use std::sync::Arc;
use tempid_types::{ResolvedValue, Subject, TempKey};

use super::{CacheIndex, CacheLimits, Clock, SystemClock, TempIdCache};

/// Volatile cache; contents vanish with the process.
pub struct MemoryCache {
    index: Mutex<CacheIndex>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(limits: CacheLimits) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    pub fn with_clock(limits: CacheLimits, clock: Arc<dyn Clock>) -> Self {
        Self { index: Mutex::new(CacheIndex::new(limits)), clock }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}

impl TempIdCache for MemoryCache {
    fn get_value(&self, subject: &Subject, key: &TempKey) -> Option<ResolvedValue> {
        self.index.lock().get(subject, key).cloned()
    }

    fn set_value(&self, subject: &Subject, key: &TempKey, value: ResolvedValue) {
        let now = self.clock.now_millis();
        self.index.lock().insert(subject, key, value, now);
    }

    fn clear_value(&self, subject: Option<&Subject>, key: &TempKey) {
        let removed = self.index.lock().remove(subject, key);
        tracing::debug!("[TempIdCache] Invalidated {} entries for key {}", removed, key);
    }

    fn len(&self) -> usize {
        self.index.lock().len()
    }

    fn clear(&self) {
        self.index.lock().clear();
    }
}
