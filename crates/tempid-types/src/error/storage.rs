//! Session storage errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by session storage backends.
///
/// The persistent cache never surfaces these to callers; they are logged and
/// the cache carries on in memory.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum StorageError {
    /// Backing file could not be read
    #[error("Storage read failed at {path}: {message}")]
    Read {
        /// Location of the backing store
        path: String,
        /// Description of the failure
        message: String,
    },

    /// Backing file could not be written
    #[error("Storage write failed at {path}: {message}")]
    Write {
        /// Location of the backing store
        path: String,
        /// Description of the failure
        message: String,
    },

    /// Backing file content is not a string map
    #[error("Storage content corrupt: {message}")]
    Corrupt {
        /// Description of the corruption
        message: String,
    },
}
