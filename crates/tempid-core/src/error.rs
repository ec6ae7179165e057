//! Unified error type for engine construction and configuration.
//!
//! Resolution itself never fails loudly: transport problems are logged by the
//! resolvers and the affected requests are dropped. These errors only surface
//! while wiring an engine together.

use tempid_types::{ConfigError, StorageError};
use thiserror::Error;

/// Main error type for tempid-core setup operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// HTTP client could not be built.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A configured URL is malformed.
    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Result type alias for tempid-core setup operations.
pub type CoreResult<T> = Result<T, CoreError>;
