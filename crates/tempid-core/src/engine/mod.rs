//! Resolution engine: cache short-circuit, request dedup, resolver selection
//! and exactly-once fan-out of resolved values.
//!
//! ```text
//! start_input ──► ResolutionSession ──resolve()*──► end_input ──► Dispatch
//!   (Idle)           (Collecting)                    (Dispatching)   │
//!                                                                     ▼
//!                     cache write-through ◄── callbacks ◄── resolvers' network calls
//! ```

mod session;


pub use session::{CompletionCallback, ResolutionSession};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempid_types::{
    CacheConfig, DefaultResolverKind, EngineConfig, ResolvedValue, Subject, TempKey,
};

use crate::cache::{CacheLimits, FileSessionStorage, MemoryCache, PersistentCache, TempIdCache};
use crate::error::CoreResult;
use crate::resolver::{
    BatchedResolver, PerKeyResolver, Resolver, ResolverRegistry, ResolverRegistryBuilder,
};
use crate::transport::{HttpTransport, Transport};

/// Entry point used by page-scanning collaborators.
pub struct ResolutionEngine {
    cache: Option<Arc<dyn TempIdCache>>,
    registry: Arc<ResolverRegistry>,
}

impl ResolutionEngine {
    pub fn builder() -> ResolutionEngineBuilder {
        ResolutionEngineBuilder::default()
    }

    /// Engine wired from configuration with an [`HttpTransport`].
    pub fn from_config(config: &EngineConfig) -> CoreResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config.transport)?);
        Ok(ResolutionEngineBuilder::from_config(config, transport)?.build())
    }

    /// Opens a resolution session. `on_complete` fires once every request of
    /// the session has resolved.
    pub fn start_input(&self, on_complete: Option<CompletionCallback>) -> ResolutionSession {
        ResolutionSession::new(self.cache.clone(), self.registry.clone(), on_complete)
    }

    /// Resolves `pairs` in one session and waits for every network call.
    ///
    /// Pairs the backend did not answer are absent from the result.
    pub async fn resolve_all(
        &self,
        pairs: impl IntoIterator<Item = (Subject, TempKey)>,
    ) -> HashMap<(Subject, TempKey), ResolvedValue> {
        let results: Arc<Mutex<HashMap<(Subject, TempKey), ResolvedValue>>> = Arc::default();

        let mut session = self.start_input(None);
        for (subject, key) in pairs {
            let results = results.clone();
            let pair = (subject.clone(), key.clone());
            session.resolve(subject, key, move |value| {
                results.lock().insert(pair, value);
            });
        }
        session.end_input().join().await;

        let resolved = std::mem::take(&mut *results.lock());
        resolved
    }

    /// Drops a cached value; with `subject == None` the key is dropped under
    /// every subject.
    pub fn invalidate(&self, subject: Option<&Subject>, key: &TempKey) {
        if let Some(cache) = &self.cache {
            cache.clear_value(subject, key);
        }
    }

    /// Number of cached values, 0 when caching is disabled.
    pub fn cached_items(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    pub fn cache(&self) -> Option<&Arc<dyn TempIdCache>> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }
}

#[derive(Default)]
pub struct ResolutionEngineBuilder {
    cache: Option<Arc<dyn TempIdCache>>,
    registry: ResolverRegistryBuilder,
}

impl ResolutionEngineBuilder {
    /// Builder pre-populated from configuration. Custom per-subject resolvers
    /// can still be added before [`build`](Self::build).
    pub fn from_config(config: &EngineConfig, transport: Arc<dyn Transport>) -> CoreResult<Self> {
        config.validate_config()?;

        let mut builder = Self::default();
        if config.cache.enabled {
            builder = builder.cache(open_cache(&config.cache)?);
        }

        let default: Option<Arc<dyn Resolver>> = match config.default_resolver {
            DefaultResolverKind::Batched => Some(Arc::new(BatchedResolver::new(
                transport,
                config.batch.resolve_url.clone(),
                config.batch.max_ids_per_request,
            ))),
            DefaultResolverKind::PerKey => {
                let base_url = config.per_key.base_url.as_deref().unwrap_or_default();
                Some(Arc::new(PerKeyResolver::new(transport, base_url)?))
            },
            DefaultResolverKind::None => None,
        };
        if let Some(default) = default {
            builder = builder.default_resolver(default);
        }

        tracing::info!(
            cache_enabled = config.cache.enabled,
            persistent = config.cache.persistent,
            default_resolver = ?config.default_resolver,
            "[ResolutionEngine] Configured"
        );
        Ok(builder)
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn TempIdCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn default_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.registry = self.registry.default_resolver(resolver);
        self
    }

    /// Overrides the default resolver for one subject.
    #[must_use]
    pub fn subject_resolver(
        mut self,
        subject: impl Into<Subject>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        self.registry = self.registry.subject_resolver(subject, resolver);
        self
    }

    pub fn build(self) -> ResolutionEngine {
        ResolutionEngine { cache: self.cache, registry: Arc::new(self.registry.build()) }
    }
}

/// Opens the configured cache backend. Unreadable persisted state starts
/// over empty.
pub fn open_cache(config: &CacheConfig) -> CoreResult<Arc<dyn TempIdCache>> {
    let limits = CacheLimits::from(config);
    if !config.persistent {
        return Ok(Arc::new(MemoryCache::new(limits)));
    }

    let path = match &config.storage_path {
        Some(path) => PathBuf::from(path),
        None => FileSessionStorage::default_path()?,
    };
    let storage = FileSessionStorage::open(&path).unwrap_or_else(|e| {
        tracing::warn!(
            "[TempIdCache] Ignoring unreadable session storage {}: {}",
            path.display(),
            e
        );
        FileSessionStorage::empty(&path)
    });
    Ok(Arc::new(PersistentCache::open(storage, config.namespace.clone(), limits)))
}
