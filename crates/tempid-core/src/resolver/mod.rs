//! Resolver strategies turning queued `(subject, temp-ID)` pairs into values.
//!
//! A resolver follows a three-step capability set:
//!
//! 1. [`Resolver::start_input`] hands out fresh accumulation state for one
//!    resolution session.
//! 2. [`ResolverInput::resolve`] queues a request; requests for the same pair
//!    share one network lookup.
//! 3. [`ResolverInput::end_input`] consumes the state and spawns the network
//!    calls onto a [`Dispatch`].
//!
//! Built-in strategies are [`BatchedResolver`] and [`PerKeyResolver`]; any
//! other implementation can be registered per subject through
//! [`ResolverRegistry`].

mod batched;
mod per_key;
mod queue;
mod registry;

pub use batched::{partition_batches, BatchedResolver};
pub use per_key::PerKeyResolver;
pub use registry::{ResolverRegistry, ResolverRegistryBuilder};

pub(crate) use queue::OrderedMap;

use std::future::Future;
use tempid_types::{ResolvedValue, Subject, TempKey};
use tokio::task::JoinHandle;

/// Completion callback of a single pending request.
pub type ResolveCallback = Box<dyn FnOnce(ResolvedValue) + Send>;

/// One caller waiting for a `(subject, key)` pair.
///
/// Caller context travels inside the callback closure.
pub struct PendingRequest {
    pub subject: Subject,
    pub key: TempKey,
    callback: ResolveCallback,
}

impl PendingRequest {
    pub fn new(
        subject: Subject,
        key: TempKey,
        callback: impl FnOnce(ResolvedValue) + Send + 'static,
    ) -> Self {
        Self { subject, key, callback: Box::new(callback) }
    }

    /// Hands the resolved value to the caller.
    pub fn complete(self, value: ResolvedValue) {
        (self.callback)(value);
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("subject", &self.subject)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Pluggable resolution strategy.
pub trait Resolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Starts accumulating requests for one session.
    fn start_input(&self) -> Box<dyn ResolverInput>;
}

/// Accumulation state of one resolver within one session.
pub trait ResolverInput: Send {
    fn resolve(&mut self, request: PendingRequest);

    /// Ends the input phase and spawns this resolver's network calls.
    fn end_input(self: Box<Self>, dispatch: &mut Dispatch);
}

/// Network calls spawned by the resolvers of one session.
///
/// Awaiting [`Dispatch::join`] waits for every call to finish; dropping the
/// handle lets them run detached.
#[derive(Debug, Default)]
pub struct Dispatch {
    handles: Vec<JoinHandle<()>>,
}

impl Dispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` on the current tokio runtime.
    ///
    /// Without a runtime the task cannot run; it is dropped together with the
    /// requests it carries.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => self.handles.push(handle.spawn(task)),
            Err(e) => tracing::error!("[Dispatch] No tokio runtime, dropping request: {}", e),
        }
    }

    /// Number of spawned calls.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every spawned call.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                tracing::warn!("[Dispatch] Resolve task failed: {}", e);
            }
        }
    }
}
