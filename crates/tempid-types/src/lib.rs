//! # Temp-ID Types
//!
//! Core types, wire payloads and error definitions for the temp-ID resolver.
//!
//! - **`ids`** - `Subject` / `TempKey` identifiers and the resolved value alias
//! - **`wire`** - Request/response payloads exchanged with resolve backends
//! - **`config`** - Engine configuration with serde defaults and validation
//! - **`error`** - Typed error hierarchy for config, transport and storage
//!
//! ## Architecture Role
//!
//! ```text
//!        tempid-types (this crate)
//!               │
//!               ▼
//!         tempid-core
//!               │
//!               ▼
//!         tempid-cli
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod wire;

pub use config::{
    BatchConfig, CacheConfig, DefaultResolverKind, EngineConfig, PerKeyConfig, TransportConfig,
};
pub use error::{ConfigError, StorageError, TransportError};
pub use ids::{ResolvedValue, Subject, TempKey};
pub use wire::{BatchRequest, BatchResponse, HttpErrorEnvelope, IdEntry, PatientRecord};
