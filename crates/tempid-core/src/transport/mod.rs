//! Boundary to the network transport collaborator.
//!
//! Resolvers describe what they need as a [`TransportRequest`]; a
//! [`Transport`] executes it and reports exactly one outcome.

mod http;

#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpTransport;

use async_trait::async_trait;
use tempid_types::TransportError;

/// Description of one backend GET request. The response is always expected
/// to be a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Absolute URL, or a path relative to the transport's base URL.
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Credentialed requests carry the transport's session parameters.
    pub with_credentials: bool,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), query: Vec::new(), with_credentials: true }
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    /// Value of the first query parameter called `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// Executes backend requests.
///
/// Implementations own protocol fallback and timeouts; the returned `Result`
/// guarantees a single success-or-error outcome per request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError>;

    /// Whether credentialed cross-origin requests are possible. Resolvers fall
    /// back to their legacy request shape when this is `false`.
    fn supports_credentials(&self) -> bool {
        true
    }
}
