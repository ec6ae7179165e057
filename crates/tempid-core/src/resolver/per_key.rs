//! Resolver for backends without a batch endpoint.
//!
//! Issues one lookup per distinct temp-ID. The returned patient record answers
//! every subject queued under that key, either through a named field or
//! through an identifier of matching type.

use std::sync::Arc;
use tempid_types::{PatientRecord, Subject, TempKey, TransportError};
use url::Url;

use super::{Dispatch, OrderedMap, PendingRequest, Resolver, ResolverInput};
use crate::error::{CoreError, CoreResult};
use crate::transport::{Transport, TransportRequest};

const TOKEN_PARAM: &str = "tokenId";

/// One request per distinct key against a patient list service.
pub struct PerKeyResolver {
    transport: Arc<dyn Transport>,
    base_url: Url,
}

impl PerKeyResolver {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> CoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|source| CoreError::Url { url: base_url.to_string(), source })?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::Url {
                url: base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        Ok(Self { transport, base_url })
    }
}

impl Resolver for PerKeyResolver {
    fn name(&self) -> &str {
        "per_key"
    }

    fn start_input(&self) -> Box<dyn ResolverInput> {
        Box::new(PerKeyInput {
            transport: self.transport.clone(),
            base_url: self.base_url.clone(),
            keys: OrderedMap::default(),
        })
    }
}

struct PerKeyInput {
    transport: Arc<dyn Transport>,
    base_url: Url,
    keys: OrderedMap<TempKey, OrderedMap<Subject, Vec<PendingRequest>>>,
}

impl ResolverInput for PerKeyInput {
    fn resolve(&mut self, request: PendingRequest) {
        let subject = request.subject.clone();
        self.keys.entry_or_default(request.key.clone()).entry_or_default(subject).push(request);
    }

    fn end_input(self: Box<Self>, dispatch: &mut Dispatch) {
        if self.keys.is_empty() {
            return;
        }
        tracing::debug!("[PerKeyResolver] Dispatching {} key lookup(s)", self.keys.len());

        for (key, subjects) in self.keys.into_entries() {
            // Capability detection happens per call.
            let request = lookup_request(&self.base_url, &key, self.transport.supports_credentials());
            let transport = self.transport.clone();
            dispatch.spawn(async move {
                run_lookup(transport.as_ref(), request, &key, subjects).await;
            });
        }
    }
}

/// Credentialed: `GET {base}/patients?tokenId=<key>`.
/// Legacy: `GET {base}/patients/tokenId/<key>`, no credentials.
fn lookup_request(base_url: &Url, key: &TempKey, credentialed: bool) -> TransportRequest {
    let mut url = base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("patients");
        if !credentialed {
            segments.push(TOKEN_PARAM).push(key.as_str());
        }
    }

    if credentialed {
        TransportRequest::get(url.as_str()).query(TOKEN_PARAM, key.as_str())
    } else {
        TransportRequest::get(url.as_str()).with_credentials(false)
    }
}

fn parse_record(payload: serde_json::Value) -> Result<PatientRecord, TransportError> {
    let mut records: Vec<PatientRecord> = serde_json::from_value(payload)
        .map_err(|e| TransportError::InvalidResponse { message: e.to_string() })?;
    if records.is_empty() {
        return Err(TransportError::InvalidResponse { message: "empty record list".to_string() });
    }
    Ok(records.swap_remove(0))
}

async fn run_lookup(
    transport: &dyn Transport,
    request: TransportRequest,
    key: &TempKey,
    subjects: OrderedMap<Subject, Vec<PendingRequest>>,
) {
    let record = match transport.fetch(request).await.and_then(parse_record) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                key = %key,
                status = e.status(),
                "[PerKeyResolver] Lookup failed, dropping {} subject(s): {}",
                subjects.len(),
                e
            );
            return;
        },
    };

    for (subject, requests) in subjects.into_entries() {
        match record.lookup(&subject) {
            Some(value) => {
                for request in requests {
                    request.complete(value.clone());
                }
            },
            None => tracing::debug!(
                subject = %subject,
                key = %key,
                "[PerKeyResolver] Record has neither field nor id type for subject"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use parking_lot::Mutex;
    use serde_json::json;
    use tempid_types::ResolvedValue;

    type Seen = Arc<Mutex<Vec<(String, ResolvedValue)>>>;

    fn request(subject: &str, key: &str, seen: &Seen) -> PendingRequest {
        let seen = seen.clone();
        let tag = format!("{}/{}", subject, key);
        PendingRequest::new(Subject::from(subject), TempKey::from(key), move |value| {
            seen.lock().push((tag, value));
        })
    }

    async fn run(resolver: &PerKeyResolver, requests: Vec<PendingRequest>) {
        let mut input = resolver.start_input();
        for request in requests {
            input.resolve(request);
        }
        let mut dispatch = Dispatch::new();
        input.end_input(&mut dispatch);
        dispatch.join().await;
    }

    fn record_response() -> serde_json::Value {
        json!([{
            "fields": {"vorname": "Anna", "geburtsjahr": 1980},
            "ids": [{"idType": "pid", "idString": "PID-1"}, {"idType": "name", "idString": "Bob"}]
        }])
    }

    #[tokio::test]
    async fn test_one_request_per_key_across_subjects() {
        let transport = MockTransport::new(|_| Ok(record_response()));
        let resolver =
            PerKeyResolver::new(Arc::new(transport.clone()), "https://ml.example.org/ml").unwrap();
        let seen: Seen = Arc::default();

        run(
            &resolver,
            vec![
                request("vorname", "tok1", &seen),
                request("pid", "tok1", &seen),
                request("vorname", "tok1", &seen),
            ],
        )
        .await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://ml.example.org/ml/patients");
        assert_eq!(requests[0].query_value("tokenId"), Some("tok1"));
        assert!(requests[0].with_credentials);

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("vorname/tok1".to_string(), json!("Anna")));
        assert_eq!(seen[1], ("vorname/tok1".to_string(), json!("Anna")));
        assert_eq!(seen[2], ("pid/tok1".to_string(), json!("PID-1")));
    }

    #[tokio::test]
    async fn test_id_list_fallback() {
        let transport = MockTransport::new(|_| {
            Ok(json!([{"fields": {}, "ids": [{"idType": "name", "idString": "Bob"}]}]))
        });
        let resolver = PerKeyResolver::new(Arc::new(transport), "https://ml.example.org").unwrap();
        let seen: Seen = Arc::default();

        run(&resolver, vec![request("name", "tok1", &seen)]).await;

        assert_eq!(*seen.lock(), vec![("name/tok1".to_string(), json!("Bob"))]);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_dropped() {
        let transport = MockTransport::new(|_| Ok(record_response()));
        let resolver = PerKeyResolver::new(Arc::new(transport), "https://ml.example.org").unwrap();
        let seen: Seen = Arc::default();

        run(&resolver, vec![request("unknown", "tok1", &seen), request("pid", "tok1", &seen)])
            .await;

        assert_eq!(*seen.lock(), vec![("pid/tok1".to_string(), json!("PID-1"))]);
    }

    #[tokio::test]
    async fn test_legacy_mechanism_uses_path_segments() {
        let transport = MockTransport::new(|_| Ok(record_response())).legacy();
        let resolver =
            PerKeyResolver::new(Arc::new(transport.clone()), "https://ml.example.org/ml/").unwrap();
        let seen: Seen = Arc::default();

        run(&resolver, vec![request("pid", "tok 1", &seen)]).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://ml.example.org/ml/patients/tokenId/tok%201");
        assert!(requests[0].query.is_empty());
        assert!(!requests[0].with_credentials);
        assert_eq!(*seen.lock(), vec![("pid/tok 1".to_string(), json!("PID-1"))]);
    }

    #[tokio::test]
    async fn test_malformed_and_empty_responses_are_silent() {
        for body in [json!([]), json!({"fields": {}}), json!("oops")] {
            let transport = MockTransport::new(move |_| Ok(body.clone()));
            let resolver =
                PerKeyResolver::new(Arc::new(transport), "https://ml.example.org").unwrap();
            let seen: Seen = Arc::default();

            run(&resolver, vec![request("pid", "tok1", &seen)]).await;

            assert!(seen.lock().is_empty());
        }
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let transport = MockTransport::new(|_| Ok(json!([])));
        assert!(PerKeyResolver::new(Arc::new(transport.clone()), "not a url").is_err());
        assert!(PerKeyResolver::new(Arc::new(transport), "mailto:someone@example.org").is_err());
    }
}
