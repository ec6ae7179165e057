//! Scripted transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tempid_types::TransportError;

use super::{Transport, TransportRequest};

type Responder =
    Box<dyn Fn(&TransportRequest) -> Result<serde_json::Value, TransportError> + Send + Sync>;

/// Records every request and answers through a closure.
#[derive(Clone)]
pub(crate) struct MockTransport {
    requests: Arc<Mutex<Vec<TransportRequest>>>,
    responder: Arc<Responder>,
    credentials: bool,
}

impl MockTransport {
    pub(crate) fn new(
        responder: impl Fn(&TransportRequest) -> Result<serde_json::Value, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(Box::new(responder)),
            credentials: true,
        }
    }

    pub(crate) fn legacy(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        self.requests.lock().push(request.clone());
        (self.responder)(&request)
    }

    fn supports_credentials(&self) -> bool {
        self.credentials
    }
}
