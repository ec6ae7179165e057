//! One collection pass of the resolution engine.

use parking_lot::Mutex;
use std::sync::Arc;
use tempid_types::{ResolvedValue, Subject, TempKey};

use crate::cache::TempIdCache;
use crate::resolver::{Dispatch, PendingRequest, ResolverInput, ResolverRegistry};

/// Fires once every request of a session has resolved.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

struct Progress {
    outstanding: usize,
    input_closed: bool,
    on_complete: Option<CompletionCallback>,
}

/// Outstanding-request counter shared by every wrapped callback of a session.
#[derive(Clone)]
struct SessionProgress(Arc<Mutex<Progress>>);

impl SessionProgress {
    fn new(on_complete: Option<CompletionCallback>) -> Self {
        Self(Arc::new(Mutex::new(Progress { outstanding: 0, input_closed: false, on_complete })))
    }

    fn outstanding(&self) -> usize {
        self.0.lock().outstanding
    }

    fn begin_request(&self) {
        self.0.lock().outstanding += 1;
    }

    fn finish_request(&self) {
        let ready = {
            let mut progress = self.0.lock();
            progress.outstanding = progress.outstanding.saturating_sub(1);
            Self::take_if_done(&mut progress)
        };
        Self::fire(ready);
    }

    fn close_input(&self) {
        let ready = {
            let mut progress = self.0.lock();
            progress.input_closed = true;
            Self::take_if_done(&mut progress)
        };
        Self::fire(ready);
    }

    // Completion is only possible once input is closed, so a resolver that
    // answers synchronously cannot end the session early.
    fn take_if_done(progress: &mut Progress) -> Option<CompletionCallback> {
        if progress.input_closed && progress.outstanding == 0 {
            progress.on_complete.take()
        } else {
            None
        }
    }

    fn fire(ready: Option<CompletionCallback>) {
        if let Some(on_complete) = ready {
            tracing::debug!("[ResolutionEngine] Session complete");
            on_complete();
        }
    }
}

/// Collects resolution requests between `start_input` and [`end_input`].
///
/// Created by [`ResolutionEngine::start_input`](super::ResolutionEngine::start_input).
///
/// [`end_input`]: ResolutionSession::end_input
pub struct ResolutionSession {
    cache: Option<Arc<dyn TempIdCache>>,
    registry: Arc<ResolverRegistry>,
    inputs: Vec<Box<dyn ResolverInput>>,
    progress: SessionProgress,
}

impl ResolutionSession {
    pub(crate) fn new(
        cache: Option<Arc<dyn TempIdCache>>,
        registry: Arc<ResolverRegistry>,
        on_complete: Option<CompletionCallback>,
    ) -> Self {
        let inputs = registry.resolvers().iter().map(|resolver| resolver.start_input()).collect();
        Self { cache, registry, inputs, progress: SessionProgress::new(on_complete) }
    }

    /// Requests the value of `(subject, key)`.
    ///
    /// A cache hit calls `callback` before returning; a cached `null` is not a
    /// hit. A miss queues the request with the subject's resolver; the
    /// callback then runs once the value arrives, after the value has been
    /// written to the cache. If the backend never answers, the callback is
    /// never called.
    pub fn resolve(
        &mut self,
        subject: impl Into<Subject>,
        key: impl Into<TempKey>,
        callback: impl FnOnce(ResolvedValue) + Send + 'static,
    ) {
        let subject = subject.into();
        let key = key.into();

        let cached = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get_value(&subject, &key))
            .filter(|value| !value.is_null());
        if let Some(value) = cached {
            tracing::debug!(subject = %subject, key = %key, "[ResolutionEngine] Cache hit");
            callback(value);
            return;
        }

        let Some(position) = self.registry.lookup(&subject) else {
            tracing::warn!(
                subject = %subject,
                key = %key,
                "[ResolutionEngine] No resolver for subject, dropping request"
            );
            return;
        };

        self.progress.begin_request();
        let cache = self.cache.clone();
        let progress = self.progress.clone();
        let (cached_subject, cached_key) = (subject.clone(), key.clone());
        let wrapped = move |value: ResolvedValue| {
            if let Some(cache) = &cache {
                cache.set_value(&cached_subject, &cached_key, value.clone());
            }
            callback(value);
            progress.finish_request();
        };

        self.inputs[position].resolve(PendingRequest::new(subject, key, wrapped));
    }

    /// Requests queued and not yet answered.
    pub fn outstanding(&self) -> usize {
        self.progress.outstanding()
    }

    /// Ends the input phase and dispatches every resolver's requests.
    ///
    /// When nothing is outstanding (all cache hits) the completion callback
    /// runs here, before any dispatch. Must be called inside a tokio runtime.
    pub fn end_input(self) -> Dispatch {
        tracing::debug!(
            outstanding = self.progress.outstanding(),
            "[ResolutionEngine] Input closed, dispatching"
        );
        self.progress.close_input();

        let mut dispatch = Dispatch::new();
        for input in self.inputs {
            input.end_input(&mut dispatch);
        }
        dispatch
    }
}
