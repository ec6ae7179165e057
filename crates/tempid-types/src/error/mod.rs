//! Typed error definitions for the temp-ID resolver.
//!
//! Every error here is serializable, displayable for logging and matchable by
//! variant.

mod config;
mod storage;
mod transport;

pub use config::ConfigError;
pub use storage::StorageError;
pub use transport::TransportError;
