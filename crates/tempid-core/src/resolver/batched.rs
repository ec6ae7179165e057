//! Resolver that groups many keys into size-bounded batch requests.

use std::sync::Arc;
use tempid_types::{BatchRequest, BatchResponse, Subject, TempKey};

use super::{Dispatch, OrderedMap, PendingRequest, Resolver, ResolverInput};
use crate::transport::{Transport, TransportRequest};

/// Query parameter carrying the serialized [`BatchRequest`].
const DATA_PARAM: &str = "data";

/// Sends one GET per batch of at most `max_ids_per_request` keys.
pub struct BatchedResolver {
    transport: Arc<dyn Transport>,
    resolve_url: String,
    max_ids_per_request: usize,
}

impl BatchedResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolve_url: impl Into<String>,
        max_ids_per_request: usize,
    ) -> Self {
        Self {
            transport,
            resolve_url: resolve_url.into(),
            max_ids_per_request: max_ids_per_request.max(1),
        }
    }
}

impl Resolver for BatchedResolver {
    fn name(&self) -> &str {
        "batched"
    }

    fn start_input(&self) -> Box<dyn ResolverInput> {
        Box::new(BatchedInput {
            transport: self.transport.clone(),
            resolve_url: self.resolve_url.clone(),
            max_ids_per_request: self.max_ids_per_request,
            subjects: OrderedMap::default(),
        })
    }
}

/// All callers waiting for one pair.
struct QueuedPair {
    subject: Subject,
    key: TempKey,
    requests: Vec<PendingRequest>,
}

struct BatchedInput {
    transport: Arc<dyn Transport>,
    resolve_url: String,
    max_ids_per_request: usize,
    subjects: OrderedMap<Subject, OrderedMap<TempKey, Vec<PendingRequest>>>,
}

impl ResolverInput for BatchedInput {
    fn resolve(&mut self, request: PendingRequest) {
        let key = request.key.clone();
        self.subjects.entry_or_default(request.subject.clone()).entry_or_default(key).push(request);
    }

    fn end_input(self: Box<Self>, dispatch: &mut Dispatch) {
        let pairs: Vec<QueuedPair> = self
            .subjects
            .into_entries()
            .into_iter()
            .flat_map(|(subject, keys)| {
                keys.into_entries().into_iter().map(move |(key, requests)| QueuedPair {
                    subject: subject.clone(),
                    key,
                    requests,
                })
            })
            .collect();

        if pairs.is_empty() {
            return;
        }

        let batches = partition_batches(pairs, self.max_ids_per_request);
        tracing::debug!("[BatchedResolver] Dispatching {} batch request(s)", batches.len());

        for batch in batches {
            let transport = self.transport.clone();
            let url = self.resolve_url.clone();
            dispatch.spawn(async move {
                run_batch(transport.as_ref(), &url, batch).await;
            });
        }
    }
}

/// Greedy, order-preserving split into chunks of at most `max` items.
pub fn partition_batches<T>(items: Vec<T>, max: usize) -> Vec<Vec<T>> {
    let max = max.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(max));
    let mut current = Vec::with_capacity(max);
    for item in items {
        if current.len() >= max {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(max)));
        }
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

async fn run_batch(transport: &dyn Transport, url: &str, batch: Vec<QueuedPair>) {
    let mut payload = BatchRequest::default();
    for pair in &batch {
        payload.push(&pair.subject, &pair.key);
    }
    let data = match serde_json::to_string(&payload) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("[BatchedResolver] Could not serialize batch: {}", e);
            return;
        },
    };

    let request = TransportRequest::get(url).query(DATA_PARAM, data);
    let response = match transport.fetch(request).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                keys = payload.key_count(),
                status = e.status(),
                "[BatchedResolver] Batch request failed, dropping its requests: {}",
                e
            );
            return;
        },
    };

    let response = BatchResponse::from(response);
    if !response.is_object() {
        tracing::warn!(
            keys = payload.key_count(),
            "[BatchedResolver] Batch response is not an object, dropping its requests"
        );
        return;
    }

    for pair in batch {
        match response.value(&pair.subject, &pair.key) {
            Some(value) => {
                for request in pair.requests {
                    request.complete(value.clone());
                }
            },
            None => tracing::debug!(
                subject = %pair.subject,
                key = %pair.key,
                "[BatchedResolver] Pair missing from response"
            ),
        }
    }
}
