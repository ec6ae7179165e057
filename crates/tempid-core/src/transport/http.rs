//! reqwest-backed [`Transport`].

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tempid_types::{HttpErrorEnvelope, TransportConfig, TransportError};
use url::Url;

use super::{Transport, TransportRequest};
use crate::error::{CoreError, CoreResult};

/// HTTP transport with a base URL and persistent session parameters.
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
    timeout: Duration,
    params: RwLock<BTreeMap<String, String>>,
    credentials: bool,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> CoreResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).tcp_nodelay(true).build()?;
        let base_url = config.base_url.as_deref().map(parse_base_url).transpose()?;

        tracing::info!(
            base_url = base_url.as_ref().map_or("<none>", Url::as_str),
            timeout_secs = config.timeout_secs,
            "[HttpTransport] Initialized"
        );

        Ok(Self {
            client,
            base_url,
            timeout,
            params: RwLock::new(config.params.clone()),
            credentials: true,
        })
    }

    /// Forces the restricted legacy request shape in resolvers that have one.
    #[must_use]
    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    /// Adds or replaces a parameter appended to every credentialed request.
    pub fn add_param(&self, name: impl Into<String>, value: impl Into<String>) {
        self.params.write().insert(name.into(), value.into());
    }

    /// Removes a persistent parameter; `false` if it was not set.
    pub fn remove_param(&self, name: &str) -> bool {
        self.params.write().remove(name).is_some()
    }

    /// Resolves `url` against the base URL. Absolute URLs pass through.
    fn full_url(&self, url: &str) -> Result<Url, TransportError> {
        let joined = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        joined.map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn send(
        &self,
        request: &TransportRequest,
        url: Url,
    ) -> Result<reqwest::Response, TransportError> {
        let target = url.to_string();
        let mut builder = self.client.get(url);

        if request.with_credentials {
            let params: Vec<(String, String)> =
                self.params.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            if !params.is_empty() {
                builder = builder.query(&params);
            }
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: target, secs: self.timeout.as_secs() }
            } else {
                TransportError::Connection { message: e.to_string() }
            }
        })
    }
}

/// Parses a base URL, adding the trailing `/` that makes relative joins
/// append to its last path segment instead of replacing it.
fn parse_base_url(base: &str) -> CoreResult<Url> {
    let mut url =
        Url::parse(base).map_err(|source| CoreError::Url { url: base.to_string(), source })?;
    if url.cannot_be_a_base() {
        return Err(CoreError::Url {
            url: base.to_string(),
            source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        let url = self.full_url(&request.url)?;
        tracing::debug!(url = %url, "[HttpTransport] Sending request");

        let response = self.send(&request, url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16() });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse { message: e.to_string() })?;

        if let Some(envelope) = HttpErrorEnvelope::detect(&payload) {
            return Err(TransportError::Server {
                status: envelope.error.http_status_code,
                message: envelope.error.msg,
            });
        }
        Ok(payload)
    }

    fn supports_credentials(&self) -> bool {
        self.credentials
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn transport(base_url: Option<&str>) -> HttpTransport {
        HttpTransport::new(&TransportConfig {
            base_url: base_url.map(str::to_string),
            ..TransportConfig::default()
        })
        .unwrap()
    }

    fn full_url(t: &HttpTransport, url: &str) -> String {
        t.full_url(url).unwrap().to_string()
    }

    #[test]
    fn test_full_url_joins_base() {
        let t = transport(Some("https://app.example.org/ctx/"));
        assert_eq!(full_url(&t, "resolveTempIds"), "https://app.example.org/ctx/resolveTempIds");
        assert_eq!(full_url(&t, "https://other.example.org/x"), "https://other.example.org/x");
    }

    #[test]
    fn test_base_without_trailing_slash_keeps_last_segment() {
        let t = transport(Some("https://app.example.org/ctx"));
        assert_eq!(full_url(&t, "resolveTempIds"), "https://app.example.org/ctx/resolveTempIds");

        let t = transport(Some("https://app.example.org"));
        assert_eq!(full_url(&t, "resolveTempIds"), "https://app.example.org/resolveTempIds");
    }

    #[test]
    fn test_full_url_without_base() {
        let t = transport(None);
        assert_eq!(full_url(&t, "http://localhost/resolve"), "http://localhost/resolve");
        assert!(matches!(t.full_url("resolveTempIds"), Err(TransportError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpTransport::new(&TransportConfig {
            base_url: Some("not a url".to_string()),
            ..TransportConfig::default()
        });
        assert!(matches!(result, Err(CoreError::Url { .. })));
    }

    #[test]
    fn test_params_and_credentials() {
        let t = transport(None);
        t.add_param("sessionToken", "abc");
        assert!(t.remove_param("sessionToken"));
        assert!(!t.remove_param("sessionToken"));

        assert!(t.supports_credentials());
        assert!(!t.without_credentials().supports_credentials());
    }
}
