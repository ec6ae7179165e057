//! Transport failures reported by backend calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a single backend request can end with.
///
/// Resolvers log these and drop the affected pending requests; nothing is
/// retried.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, TLS, ...)
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the failure
        message: String,
    },

    /// Request URL could not be resolved against the base URL
    #[error("Invalid request URL '{url}': {message}")]
    InvalidUrl {
        /// URL as given by the resolver
        url: String,
        /// Parse failure
        message: String,
    },

    /// Request did not complete within its timeout
    #[error("Request to {url} timed out after {secs}s")]
    Timeout {
        /// Target URL
        url: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// Backend answered with a non-success HTTP status
    #[error("Backend returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Backend answered 200 with an in-band error envelope
    #[error("Backend error ({status}): {message}")]
    Server {
        /// Status code carried in the envelope
        status: u16,
        /// Message carried in the envelope
        message: String,
    },

    /// Response body was not the expected structured record
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the parse failure
        message: String,
    },
}

impl TransportError {
    /// HTTP-like status for the error path, 0 when no status exists.
    pub fn status(&self) -> u16 {
        match self {
            Self::Status { status } | Self::Server { status, .. } => *status,
            Self::Connection { .. }
            | Self::InvalidUrl { .. }
            | Self::Timeout { .. }
            | Self::InvalidResponse { .. } => 0,
        }
    }
}
